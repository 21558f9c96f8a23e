//! PostgreSQL data adapter for the same `equity_*` tables.

use crate::domain::error::ScantraderError;
use crate::domain::indicator::IndicatorRow;
use crate::domain::price_bar::PriceBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use postgres::NoTls;
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;

type Manager = PostgresConnectionManager<NoTls>;

fn query_err(e: postgres::Error) -> ScantraderError {
    ScantraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

// NULL prices surface as NaN so the simulator skips the trade
fn price_column(row: &postgres::Row, idx: usize) -> Result<f64, ScantraderError> {
    Ok(row
        .try_get::<_, Option<f64>>(idx)
        .map_err(query_err)?
        .unwrap_or(f64::NAN))
}

pub struct PostgresAdapter {
    pool: Pool<Manager>,
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ScantraderError> {
        // [postgres] connection_string first, then [database] conninfo
        let connection_string = config
            .get_string("postgres", "connection_string")
            .or_else(|| config.get_string("database", "conninfo"))
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ScantraderError::ConfigMissing {
                section: "database".into(),
                key: "conninfo".into(),
            })?;

        let pg_config: postgres::Config =
            connection_string
                .parse()
                .map_err(|e: postgres::Error| ScantraderError::ConfigInvalid {
                    section: "database".into(),
                    key: "conninfo".into(),
                    reason: e.to_string(),
                })?;

        let pool_size = config.get_int("postgres", "pool_size", 4).max(1) as u32;
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(PostgresConnectionManager::new(pg_config, NoTls))
            .map_err(|e| ScantraderError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<Manager>, ScantraderError> {
        self.pool.get().map_err(|e| ScantraderError::Database {
            reason: e.to_string(),
        })
    }
}

impl DataPort for PostgresAdapter {
    fn fetch_bars(
        &self,
        symbol_id: i64,
        timeframe: &str,
        date_from: NaiveDate,
    ) -> Result<Vec<PriceBar>, ScantraderError> {
        let query = "SELECT date::date, \
                            open::double precision, high::double precision, \
                            low::double precision, close::double precision, \
                            volume::bigint, adj_close::double precision \
                     FROM equity_price_data \
                     WHERE symbol_id = $1 AND timeframe = $2 AND date::date >= $3 \
                     ORDER BY date ASC";

        let rows = self
            .conn()?
            .query(query, &[&symbol_id, &timeframe, &date_from])
            .map_err(query_err)?;

        rows.into_iter()
            .map(|row| {
                let close = price_column(&row, 4)?;
                Ok(PriceBar {
                    date: row.try_get(0).map_err(query_err)?,
                    open: price_column(&row, 1)?,
                    high: price_column(&row, 2)?,
                    low: price_column(&row, 3)?,
                    close,
                    volume: row
                        .try_get::<_, Option<i64>>(5)
                        .map_err(query_err)?
                        .unwrap_or(0),
                    adj_close: row
                        .try_get::<_, Option<f64>>(6)
                        .map_err(query_err)?
                        .unwrap_or(close),
                })
            })
            .collect()
    }

    fn fetch_indicator_at(
        &self,
        symbol_id: i64,
        timeframe: &str,
        date: NaiveDate,
    ) -> Result<Option<IndicatorRow>, ScantraderError> {
        let query = "SELECT date::date, atr_14::double precision, \
                            rsi_3::double precision, rsi_9::double precision, \
                            rsi_14::double precision, ema_rsi_9_3::double precision, \
                            wma_rsi_9_21::double precision \
                     FROM equity_indicators \
                     WHERE symbol_id = $1 AND timeframe = $2 AND date::date = $3 \
                       AND is_final::int = 1";

        let row = self
            .conn()?
            .query_opt(query, &[&symbol_id, &timeframe, &date])
            .map_err(query_err)?;

        row.map(|row| {
            Ok(IndicatorRow {
                date: row.try_get(0).map_err(query_err)?,
                atr_14: row.try_get(1).map_err(query_err)?,
                rsi_3: row.try_get(2).map_err(query_err)?,
                rsi_9: row.try_get(3).map_err(query_err)?,
                rsi_14: row.try_get(4).map_err(query_err)?,
                ema_rsi_9_3: row.try_get(5).map_err(query_err)?,
                wma_rsi_9_21: row.try_get(6).map_err(query_err)?,
                is_final: true,
            })
        })
        .transpose()
    }

    fn get_data_range(
        &self,
        symbol_id: i64,
        timeframe: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, ScantraderError> {
        let query = "SELECT MIN(date::date), MAX(date::date), COUNT(*) \
                     FROM equity_price_data WHERE symbol_id = $1 AND timeframe = $2";

        let row = self
            .conn()?
            .query_one(query, &[&symbol_id, &timeframe])
            .map_err(query_err)?;

        let min: Option<NaiveDate> = row.try_get(0).map_err(query_err)?;
        let max: Option<NaiveDate> = row.try_get(1).map_err(query_err)?;
        let count: i64 = row.try_get(2).map_err(query_err)?;

        match (min, max) {
            (Some(min), Some(max)) if count > 0 => Ok(Some((min, max, count as usize))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(&'static str, &'static str), &'static str>);

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0
                .iter()
                .find(|((s, k), _)| *s == section && *k == key)
                .map(|(_, v)| v.to_string())
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    #[test]
    fn from_config_missing_connection_string() {
        let config = MapConfig(HashMap::new());
        match PostgresAdapter::from_config(&config) {
            Err(ScantraderError::ConfigMissing { section, key }) => {
                assert_eq!(section, "database");
                assert_eq!(key, "conninfo");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn from_config_rejects_unparsable_conninfo() {
        let config = MapConfig(HashMap::from([(("database", "conninfo"), "host='unterminated")]));
        assert!(matches!(
            PostgresAdapter::from_config(&config),
            Err(ScantraderError::ConfigInvalid { .. })
        ));
    }
}
