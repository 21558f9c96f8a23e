//! SQLite price database adapter.
//!
//! Reads the `equity_price_data` and `equity_indicators` tables produced by
//! the scanner's ingestion jobs. Connections come from an r2d2 pool and go
//! back to it when dropped.

use crate::domain::error::ScantraderError;
use crate::domain::indicator::IndicatorRow;
use crate::domain::price_bar::{parse_stored_date, PriceBar};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS equity_symbols (
    symbol_id INTEGER PRIMARY KEY,
    symbol TEXT NOT NULL UNIQUE,
    name TEXT,
    exchange TEXT
);
CREATE TABLE IF NOT EXISTS equity_price_data (
    symbol_id INTEGER NOT NULL,
    timeframe TEXT NOT NULL,
    date TEXT NOT NULL,
    open REAL,
    high REAL,
    low REAL,
    close REAL,
    volume INTEGER,
    adj_close REAL,
    PRIMARY KEY (symbol_id, timeframe, date)
);
CREATE TABLE IF NOT EXISTS equity_indicators (
    symbol_id INTEGER NOT NULL,
    timeframe TEXT NOT NULL,
    date TEXT NOT NULL,
    atr_14 REAL,
    rsi_3 REAL,
    rsi_9 REAL,
    rsi_14 REAL,
    ema_rsi_9_3 REAL,
    wma_rsi_9_21 REAL,
    is_final INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (symbol_id, timeframe, date)
);
CREATE INDEX IF NOT EXISTS idx_price_symbol_tf_date
    ON equity_price_data(symbol_id, timeframe, date);
CREATE INDEX IF NOT EXISTS idx_indicators_symbol_tf_date
    ON equity_indicators(symbol_id, timeframe, date);";

fn pool_err(e: r2d2::Error) -> ScantraderError {
    ScantraderError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> ScantraderError {
    ScantraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    parse_stored_date(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

// NULL prices surface as NaN so the simulator skips the trade
fn price_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
}

fn date_param(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ScantraderError> {
        let db_path = config.require_string("sqlite", "path")?;
        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, ScantraderError> {
        // every in-memory connection is its own database, so keep exactly one
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, ScantraderError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), ScantraderError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    pub fn insert_symbol(&self, symbol_id: i64, symbol: &str) -> Result<(), ScantraderError> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO equity_symbols (symbol_id, symbol) VALUES (?1, ?2)",
                params![symbol_id, symbol],
            )
            .map_err(query_err)?;
        Ok(())
    }

    pub fn find_symbol_id(&self, symbol: &str) -> Result<Option<i64>, ScantraderError> {
        self.conn()?
            .query_row(
                "SELECT symbol_id FROM equity_symbols WHERE symbol = ?1",
                params![symbol],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)
    }

    pub fn insert_bars(
        &self,
        symbol_id: i64,
        timeframe: &str,
        bars: &[PriceBar],
    ) -> Result<(), ScantraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO equity_price_data
                    (symbol_id, timeframe, date, open, high, low, close, volume, adj_close)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    symbol_id,
                    timeframe,
                    date_param(bar.date),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    bar.adj_close
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }

    pub fn insert_indicators(
        &self,
        symbol_id: i64,
        timeframe: &str,
        rows: &[IndicatorRow],
    ) -> Result<(), ScantraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO equity_indicators
                    (symbol_id, timeframe, date, atr_14, rsi_3, rsi_9, rsi_14,
                     ema_rsi_9_3, wma_rsi_9_21, is_final)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    symbol_id,
                    timeframe,
                    date_param(row.date),
                    row.atr_14,
                    row.rsi_3,
                    row.rsi_9,
                    row.rsi_14,
                    row.ema_rsi_9_3,
                    row.wma_rsi_9_21,
                    row.is_final
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_bars(
        &self,
        symbol_id: i64,
        timeframe: &str,
        date_from: NaiveDate,
    ) -> Result<Vec<PriceBar>, ScantraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, open, high, low, close, volume, adj_close
                 FROM equity_price_data
                 WHERE symbol_id = ?1 AND timeframe = ?2 AND date >= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![symbol_id, timeframe, date_param(date_from)], |row| {
                let close = price_column(row, 4)?;
                Ok(PriceBar {
                    date: date_column(row, 0)?,
                    open: price_column(row, 1)?,
                    high: price_column(row, 2)?,
                    low: price_column(row, 3)?,
                    close,
                    volume: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                    adj_close: row.get::<_, Option<f64>>(6)?.unwrap_or(close),
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn fetch_indicator_at(
        &self,
        symbol_id: i64,
        timeframe: &str,
        date: NaiveDate,
    ) -> Result<Option<IndicatorRow>, ScantraderError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT date, atr_14, rsi_3, rsi_9, rsi_14, ema_rsi_9_3, wma_rsi_9_21
             FROM equity_indicators
             WHERE symbol_id = ?1 AND timeframe = ?2 AND substr(date, 1, 10) = ?3
               AND is_final = 1",
            params![symbol_id, timeframe, date_param(date)],
            |row| {
                Ok(IndicatorRow {
                    date: date_column(row, 0)?,
                    atr_14: row.get(1)?,
                    rsi_3: row.get(2)?,
                    rsi_9: row.get(3)?,
                    rsi_14: row.get(4)?,
                    ema_rsi_9_3: row.get(5)?,
                    wma_rsi_9_21: row.get(6)?,
                    is_final: true,
                })
            },
        )
        .optional()
        .map_err(query_err)
    }

    fn get_data_range(
        &self,
        symbol_id: i64,
        timeframe: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, ScantraderError> {
        let conn = self.conn()?;
        let result: (Option<String>, Option<String>, i64) = conn
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM equity_price_data
                 WHERE symbol_id = ?1 AND timeframe = ?2",
                params![symbol_id, timeframe],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match result {
            (Some(min_str), Some(max_str), count) if count > 0 => {
                let parse = |s: &str| {
                    parse_stored_date(s).map_err(|e| ScantraderError::DatabaseQuery {
                        reason: format!("bad stored date '{s}': {e}"),
                    })
                };
                Ok(Some((parse(&min_str)?, parse(&max_str)?, count as usize)))
            }
            _ => Ok(None),
        }
    }
}
