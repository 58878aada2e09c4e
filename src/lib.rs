pub mod analyzer;
pub mod config;
pub mod fetcher;
pub mod model;
pub mod normalizer;
pub mod pipeline;
pub mod report;
pub mod server;
pub mod storage;
