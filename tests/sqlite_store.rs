use stock_trend::model::{BarUpdate, PriceSummary, StoreError, UpsertOutcome};
use stock_trend::storage::SqliteStore;

mod common;
use common::{bar, date, setup_store};

#[test]
fn create_schema_twice_is_idempotent() {
    let db = setup_store();
    db.store.create_schema_if_absent().expect("second call");

    let conn = rusqlite::Connection::open(db.store.path()).unwrap();
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'stock_data'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 1);
}

#[test]
fn insert_then_query_range_round_trips() {
    let db = setup_store();
    let original = bar("AAPL", date(2023, 4, 1), 125.25);
    db.store.insert(&original).unwrap();

    let rows = db
        .store
        .query_range("AAPL", date(2023, 3, 1), date(2023, 4, 30))
        .unwrap();
    assert_eq!(rows, vec![original]);
}

#[test]
fn query_range_is_inclusive_and_scoped_to_symbol() {
    let db = setup_store();
    for (symbol, day) in [("AAPL", 1), ("AAPL", 2), ("AAPL", 3), ("MSFT", 2)] {
        db.store.insert(&bar(symbol, date(2024, 2, day), 10.0)).unwrap();
    }

    let rows = db
        .store
        .query_range("AAPL", date(2024, 2, 2), date(2024, 2, 3))
        .unwrap();
    let dates: Vec<_> = rows.iter().map(|b| b.date).collect();
    assert_eq!(dates, vec![date(2024, 2, 2), date(2024, 2, 3)]);
    assert!(rows.iter().all(|b| b.symbol == "AAPL"));
}

#[test]
fn query_range_keeps_insertion_order() {
    let db = setup_store();
    db.store.insert(&bar("AAPL", date(2024, 2, 3), 3.0)).unwrap();
    db.store.insert(&bar("AAPL", date(2024, 2, 1), 1.0)).unwrap();

    let rows = db
        .store
        .query_range("AAPL", date(2024, 2, 1), date(2024, 2, 3))
        .unwrap();
    assert_eq!(rows[0].date, date(2024, 2, 3));
    assert_eq!(rows[1].date, date(2024, 2, 1));
}

#[test]
fn duplicate_insert_is_rejected() {
    let db = setup_store();
    let b = bar("AAPL", date(2024, 1, 2), 10.0);
    db.store.insert(&b).unwrap();

    let err = db.store.insert(&b).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { ref symbol, .. } if symbol == "AAPL"));
}

#[test]
fn insert_rejects_non_finite_or_negative_prices() {
    let db = setup_store();
    let day = date(2024, 1, 2);

    let mut nan_close = bar("AAPL", day, 10.0);
    nan_close.close = f64::NAN;
    let err = db.store.insert(&nan_close).unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue { field: "close", .. }), "{err:?}");

    let mut negative_open = bar("AAPL", day, 10.0);
    negative_open.open = -5.0;
    let err = db.store.insert(&negative_open).unwrap_err();
    assert!(
        matches!(err, StoreError::InvalidValue { field: "open", value } if value == -5.0),
        "{err:?}"
    );

    assert!(db.store.query_range("AAPL", day, day).unwrap().is_empty());
}

#[test]
fn update_rejects_negative_price_and_keeps_row() {
    let db = setup_store();
    let day = date(2024, 1, 2);
    db.store.insert(&bar("AAPL", day, 10.0)).unwrap();

    let err = db
        .store
        .update(
            "AAPL",
            day,
            &BarUpdate {
                close: Some(-42.0),
                ..BarUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue { field: "close", .. }), "{err:?}");

    let err = db
        .store
        .update(
            "AAPL",
            day,
            &BarUpdate {
                high: Some(f64::INFINITY),
                ..BarUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue { field: "high", .. }), "{err:?}");

    let row = &db.store.query_range("AAPL", day, day).unwrap()[0];
    assert_eq!(row.close, 10.0);
    assert_eq!(row.high, 12.0);
}

#[test]
fn bulk_insert_counts_invalid_prices_as_failures() {
    let db = setup_store();
    let mut bad = bar("AAPL", date(2024, 1, 2), 10.0);
    bad.low = f64::NAN;

    let report = db
        .store
        .bulk_insert(&[
            bar("AAPL", date(2024, 1, 1), 9.0),
            bad,
            bar("AAPL", date(2024, 1, 3), 11.0),
        ])
        .unwrap();
    assert_eq!((report.inserted, report.failed), (2, 1));
}

#[test]
fn null_price_column_fails_the_read() {
    let db = setup_store();
    let conn = rusqlite::Connection::open(db.store.path()).unwrap();
    conn.execute(
        "INSERT INTO stock_data (symbol, date, open_price, close_price, high_price, low_price, volume)
         VALUES ('AAPL', '2024-01-02', 1.0, NULL, 2.0, 0.5, 10)",
        [],
    )
    .unwrap();
    drop(conn);

    let result = db
        .store
        .query_range("AAPL", date(2024, 1, 1), date(2024, 1, 31));
    assert!(matches!(result, Err(StoreError::Database(_))), "{result:?}");
}

#[test]
fn upsert_inserts_then_overwrites() {
    let db = setup_store();
    let day = date(2024, 1, 2);

    assert_eq!(
        db.store.upsert(&bar("AAPL", day, 10.0)).unwrap(),
        UpsertOutcome::Inserted
    );
    let mut revised = bar("AAPL", day, 15.0);
    revised.volume = 42;
    assert_eq!(db.store.upsert(&revised).unwrap(), UpsertOutcome::Updated);

    assert_eq!(db.store.query_range("AAPL", day, day).unwrap(), vec![revised]);
}

#[test]
fn upsert_validates_prices() {
    let db = setup_store();
    let mut bad = bar("AAPL", date(2024, 1, 2), 10.0);
    bad.close = -1.0;
    assert!(matches!(
        db.store.upsert(&bad),
        Err(StoreError::InvalidValue { field: "close", .. })
    ));
}

#[test]
fn symbols_lists_each_stored_symbol_once() {
    let db = setup_store();
    assert!(db.store.symbols().unwrap().is_empty());
    for (symbol, day) in [("MSFT", 1), ("AAPL", 1), ("AAPL", 2)] {
        db.store.insert(&bar(symbol, date(2024, 1, day), 10.0)).unwrap();
    }
    assert_eq!(db.store.symbols().unwrap(), vec!["AAPL", "MSFT"]);
}

#[test]
fn bulk_insert_is_best_effort() {
    let db = setup_store();
    db.store.insert(&bar("AAPL", date(2024, 1, 2), 10.0)).unwrap();

    let report = db
        .store
        .bulk_insert(&[
            bar("AAPL", date(2024, 1, 1), 9.0),
            bar("AAPL", date(2024, 1, 2), 10.0),
            bar("AAPL", date(2024, 1, 3), 11.0),
        ])
        .unwrap();
    assert_eq!((report.inserted, report.failed), (2, 1));

    let rows = db
        .store
        .query_range("AAPL", date(2024, 1, 1), date(2024, 1, 31))
        .unwrap();
    assert_eq!(rows.len(), 3);
}

#[test]
fn update_changes_only_given_fields() {
    let db = setup_store();
    let day = date(2024, 1, 2);
    db.store.insert(&bar("AAPL", day, 10.0)).unwrap();

    let changed = db
        .store
        .update(
            "AAPL",
            day,
            &BarUpdate {
                close: Some(12.5),
                volume: Some(77),
                ..BarUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(changed, 1);

    let row = &db.store.query_range("AAPL", day, day).unwrap()[0];
    assert_eq!(row.close, 12.5);
    assert_eq!(row.volume, 77);
    assert_eq!(row.open, 9.0);
    assert_eq!(row.high, 12.0);
}

#[test]
fn update_of_missing_row_is_a_noop() {
    let db = setup_store();
    let changed = db
        .store
        .update(
            "AAPL",
            date(2024, 1, 2),
            &BarUpdate {
                open: Some(1.0),
                ..BarUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(changed, 0);
}

#[test]
fn delete_removes_row_and_repeats_quietly() {
    let db = setup_store();
    let day = date(2024, 1, 2);
    db.store.insert(&bar("AAPL", day, 10.0)).unwrap();
    db.store.insert(&bar("AAPL", date(2024, 1, 3), 11.0)).unwrap();

    assert_eq!(db.store.delete("AAPL", day).unwrap(), 1);
    let rows = db
        .store
        .query_range("AAPL", date(2024, 1, 1), date(2024, 1, 31))
        .unwrap();
    assert!(rows.iter().all(|b| b.date != day));
    assert_eq!(rows.len(), 1);

    assert_eq!(db.store.delete("AAPL", day).unwrap(), 0);
}

#[test]
fn summary_reports_max_min_avg() {
    let db = setup_store();
    for (day, close) in [(1, 10.0), (2, 20.0), (3, 30.0)] {
        db.store.insert(&bar("AAPL", date(2024, 1, day), close)).unwrap();
    }
    db.store.insert(&bar("MSFT", date(2024, 1, 1), 500.0)).unwrap();

    assert_eq!(
        db.store.summary("AAPL").unwrap(),
        Some(PriceSummary {
            max_close: 30.0,
            min_close: 10.0,
            avg_close: 20.0,
        })
    );
    assert_eq!(db.store.summary("TSLA").unwrap(), None);
}

#[test]
fn analysis_results_round_trip() {
    let db = setup_store();
    let id = db.store.save_analysis("AAPL", "report text").unwrap();
    assert_eq!(db.store.analysis_result(id).unwrap().as_deref(), Some("report text"));
    assert_eq!(db.store.analysis_result(id + 100).unwrap(), None);
}

#[test]
fn unreachable_database_reports_an_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = SqliteStore::new(dir.path().join("missing").join("test.db"));

    assert!(matches!(
        store.summary("AAPL"),
        Err(StoreError::Database(_))
    ));
    assert!(store.insert(&bar("AAPL", date(2024, 1, 1), 1.0)).is_err());
}
