use crate::model::{
    BarUpdate, BulkInsertReport, DailyBar, PriceSummary, StoreError, UpsertOutcome,
};
use chrono::{NaiveDate, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS stock_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        date DATE NOT NULL,
        open_price REAL,
        close_price REAL,
        high_price REAL,
        low_price REAL,
        volume INTEGER
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_stock_data_symbol_date
        ON stock_data (symbol, date);

    CREATE TABLE IF NOT EXISTS analysis (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL,
        result TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
";

const BAR_COLUMNS: &str =
    "symbol, date, open_price, close_price, high_price, low_price, volume";

/// SQLite-backed store of daily bars and rendered analyses.
///
/// Holds only the database path: every operation opens its own connection
/// and closes it before returning, so the store is cheap to clone and share.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates tables and indexes; safe to call on every startup.
    pub fn create_schema_if_absent(&self) -> Result<(), StoreError> {
        self.with_connection("create_schema", |conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
    }

    /// Inserts one bar, failing with `DuplicateKey` if (symbol, date) exists.
    pub fn insert(&self, bar: &DailyBar) -> Result<(), StoreError> {
        self.with_transaction("insert", |conn| insert_bar(conn, bar))
    }

    /// Inserts each bar independently; earlier rows stay even if later ones fail.
    pub fn bulk_insert(&self, bars: &[DailyBar]) -> Result<BulkInsertReport, StoreError> {
        self.with_connection("bulk_insert", |conn| {
            let mut report = BulkInsertReport::default();
            for bar in bars {
                match insert_bar(conn, bar) {
                    Ok(()) => report.inserted += 1,
                    Err(e) => {
                        debug!(symbol = %bar.symbol, date = %bar.date, error = %e, "row skipped");
                        report.failed += 1;
                    }
                }
            }
            Ok(report)
        })
    }

    /// Inserts the bar, or overwrites every price field of the existing row.
    pub fn upsert(&self, bar: &DailyBar) -> Result<UpsertOutcome, StoreError> {
        self.with_transaction("upsert", |conn| match insert_bar(conn, bar) {
            Ok(()) => Ok(UpsertOutcome::Inserted),
            Err(StoreError::DuplicateKey { .. }) => {
                conn.execute(
                    "UPDATE stock_data
                     SET open_price = ?1, close_price = ?2, high_price = ?3, low_price = ?4, volume = ?5
                     WHERE symbol = ?6 AND date = ?7",
                    params![
                        bar.open,
                        bar.close,
                        bar.high,
                        bar.low,
                        to_sql_volume(bar.volume)?,
                        &bar.symbol,
                        bar.date,
                    ],
                )?;
                Ok(UpsertOutcome::Updated)
            }
            Err(e) => Err(e),
        })
    }

    /// Updates the given fields of an existing bar. Returns rows affected.
    pub fn update(
        &self,
        symbol: &str,
        date: NaiveDate,
        fields: &BarUpdate,
    ) -> Result<usize, StoreError> {
        if fields.is_empty() {
            return Ok(0);
        }
        for (field, value) in [
            ("open", fields.open),
            ("high", fields.high),
            ("low", fields.low),
            ("close", fields.close),
        ] {
            if let Some(v) = value {
                check_price(field, v)?;
            }
        }

        let volume = fields.volume.map(to_sql_volume).transpose()?;
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<&dyn ToSql> = Vec::new();

        for (column, value) in [
            ("open_price", fields.open.as_ref()),
            ("high_price", fields.high.as_ref()),
            ("low_price", fields.low.as_ref()),
            ("close_price", fields.close.as_ref()),
        ] {
            if let Some(v) = value {
                assignments.push(column);
                values.push(v);
            }
        }
        if let Some(v) = volume.as_ref() {
            assignments.push("volume");
            values.push(v);
        }

        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE stock_data SET {set_clause} WHERE symbol = ?{} AND date = ?{}",
            values.len() + 1,
            values.len() + 2
        );
        values.push(&symbol);
        values.push(&date);

        self.with_transaction("update", |conn| {
            Ok(conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?)
        })
    }

    /// Removes the bar if present. Returns rows affected.
    pub fn delete(&self, symbol: &str, date: NaiveDate) -> Result<usize, StoreError> {
        self.with_transaction("delete", |conn| {
            Ok(conn.execute(
                "DELETE FROM stock_data WHERE symbol = ?1 AND date = ?2",
                params![symbol, date],
            )?)
        })
    }

    /// Bars for `symbol` with `start <= date <= end`, in primary-key order.
    pub fn query_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, StoreError> {
        self.with_connection("query_range", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {BAR_COLUMNS} FROM stock_data
                 WHERE symbol = ?1 AND date BETWEEN ?2 AND ?3
                 ORDER BY id"
            ))?;
            let bars = stmt
                .query_map(params![symbol, start, end], map_bar)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(bars)
        })
    }

    /// Distinct symbols with at least one stored bar, alphabetically.
    pub fn symbols(&self) -> Result<Vec<String>, StoreError> {
        self.with_connection("symbols", |conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT symbol FROM stock_data ORDER BY symbol")?;
            let symbols = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(symbols)
        })
    }

    /// Max, min and mean close for `symbol`; `None` when it has no rows.
    pub fn summary(&self, symbol: &str) -> Result<Option<PriceSummary>, StoreError> {
        self.with_connection("summary", |conn| {
            let row = conn.query_row(
                "SELECT MAX(close_price), MIN(close_price), AVG(close_price)
                 FROM stock_data WHERE symbol = ?1",
                params![symbol],
                |row| {
                    Ok((
                        row.get::<_, Option<f64>>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                    ))
                },
            )?;

            Ok(match row {
                (Some(max_close), Some(min_close), Some(avg_close)) => Some(PriceSummary {
                    max_close,
                    min_close,
                    avg_close,
                }),
                _ => None,
            })
        })
    }

    /// Stores a rendered analysis and returns its id.
    pub fn save_analysis(&self, symbol: &str, result: &str) -> Result<i64, StoreError> {
        self.with_transaction("save_analysis", |conn| {
            conn.execute(
                "INSERT INTO analysis (symbol, result, created_at) VALUES (?1, ?2, ?3)",
                params![symbol, result, Utc::now().to_rfc3339()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn analysis_result(&self, id: i64) -> Result<Option<String>, StoreError> {
        self.with_connection("analysis_result", |conn| {
            Ok(conn
                .query_row(
                    "SELECT result FROM analysis WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Opens a connection for one operation; it is closed when `f` returns.
    fn with_connection<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let result = self.open().and_then(|conn| f(&conn));
        if let Err(e) = &result {
            warn!(op, path = %self.path.display(), error = %e, "store operation failed");
        }
        result
    }

    /// Like `with_connection`, but commits on success and rolls back otherwise.
    fn with_transaction<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let result = self.open().and_then(|mut conn| {
            let tx = conn.transaction()?;
            let value = f(&tx)?;
            tx.commit()?;
            Ok(value)
        });
        if let Err(e) = &result {
            warn!(op, path = %self.path.display(), error = %e, "store operation failed");
        }
        result
    }
}

fn insert_bar(conn: &Connection, bar: &DailyBar) -> Result<(), StoreError> {
    check_bar(bar)?;
    let volume = to_sql_volume(bar.volume)?;
    conn.execute(
        &format!("INSERT INTO stock_data ({BAR_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
        params![
            &bar.symbol,
            &bar.date,
            &bar.open,
            &bar.close,
            &bar.high,
            &bar.low,
            &volume,
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            StoreError::DuplicateKey {
                symbol: bar.symbol.clone(),
                date: bar.date,
            }
        }
        other => StoreError::Database(other),
    })?;
    Ok(())
}

fn check_bar(bar: &DailyBar) -> Result<(), StoreError> {
    check_price("open", bar.open)?;
    check_price("high", bar.high)?;
    check_price("low", bar.low)?;
    check_price("close", bar.close)
}

fn check_price(field: &'static str, value: f64) -> Result<(), StoreError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(StoreError::InvalidValue { field, value })
    }
}

fn to_sql_volume(volume: u64) -> Result<i64, StoreError> {
    i64::try_from(volume).map_err(|e| StoreError::Conversion(format!("volume {volume}: {e}")))
}

fn map_bar(row: &Row) -> Result<DailyBar, rusqlite::Error> {
    let volume: Option<i64> = row.get(6)?;
    let volume = u64::try_from(volume.unwrap_or(0))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Integer, Box::new(e)))?;

    Ok(DailyBar {
        symbol: row.get(0)?,
        date: row.get(1)?,
        // a NULL price fails the read rather than turning into 0.0
        open: row.get(2)?,
        close: row.get(3)?,
        high: row.get(4)?,
        low: row.get(5)?,
        volume,
    })
}
