//! Configuration validation.
//!
//! Every run setting is checked before the data source is opened. Values
//! that are present but unparsable are rejected rather than silently
//! replaced by defaults.

use std::str::FromStr;

use crate::domain::error::ScantraderError;
use crate::ports::config_port::ConfigPort;

pub const TIMEFRAMES: [&str; 3] = ["1d", "1wk", "1mo"];

pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), ScantraderError> {
    validate_target_pct(config)?;
    validate_swing_lookback(config)?;
    validate_forward_days(config)?;
    validate_use_atr_stop(config)?;
    validate_timeframe(config)?;
    validate_starting_capital(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ScantraderError {
    ScantraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parse an optional value, failing on anything present but malformed.
pub fn parse_optional<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, ScantraderError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, format!("cannot parse '{}'", raw.trim()))),
    }
}

fn validate_target_pct(config: &dyn ConfigPort) -> Result<(), ScantraderError> {
    match parse_optional::<f64>(config, "simulation", "target_pct")? {
        None => Err(ScantraderError::ConfigMissing {
            section: "simulation".to_string(),
            key: "target_pct".to_string(),
        }),
        Some(v) if !v.is_finite() || v <= 0.0 => Err(invalid(
            "simulation",
            "target_pct",
            "target_pct must be a positive fraction (0.05 = 5%)",
        )),
        Some(_) => Ok(()),
    }
}

fn validate_swing_lookback(config: &dyn ConfigPort) -> Result<(), ScantraderError> {
    match parse_optional::<i64>(config, "simulation", "swing_lookback")? {
        Some(v) if v < 1 => Err(invalid(
            "simulation",
            "swing_lookback",
            "swing_lookback must be at least 1",
        )),
        _ => Ok(()),
    }
}

fn validate_forward_days(config: &dyn ConfigPort) -> Result<(), ScantraderError> {
    match parse_optional::<i64>(config, "simulation", "forward_days")? {
        Some(v) if v < 0 => Err(invalid(
            "simulation",
            "forward_days",
            "forward_days must be non-negative (0 = unbounded)",
        )),
        _ => Ok(()),
    }
}

fn validate_use_atr_stop(config: &dyn ConfigPort) -> Result<(), ScantraderError> {
    match config.get_string("simulation", "use_atr_stop") {
        Some(raw) if parse_bool(&raw).is_none() => Err(invalid(
            "simulation",
            "use_atr_stop",
            "expected true/false",
        )),
        _ => Ok(()),
    }
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), ScantraderError> {
    match config.get_string("simulation", "timeframe") {
        Some(tf) if !TIMEFRAMES.contains(&tf.trim()) => Err(invalid(
            "simulation",
            "timeframe",
            format!("timeframe must be one of {}", TIMEFRAMES.join(", ")),
        )),
        _ => Ok(()),
    }
}

fn validate_starting_capital(config: &dyn ConfigPort) -> Result<(), ScantraderError> {
    match parse_optional::<f64>(config, "weekly", "starting_capital")? {
        Some(v) if !v.is_finite() || v <= 0.0 => Err(invalid(
            "weekly",
            "starting_capital",
            "starting_capital must be positive",
        )),
        _ => Ok(()),
    }
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapConfig(HashMap<(String, String), String>);

    impl MapConfig {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            MapConfig(
                entries
                    .iter()
                    .map(|(s, k, v)| ((s.to_string(), k.to_string()), v.to_string()))
                    .collect(),
            )
        }
    }

    impl ConfigPort for MapConfig {
        fn get_string(&self, section: &str, key: &str) -> Option<String> {
            self.0.get(&(section.to_string(), key.to_string())).cloned()
        }
        fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
            self.get_string(section, key)
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }
        fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
            self.get_string(section, key)
                .and_then(|v| parse_bool(&v))
                .unwrap_or(default)
        }
    }

    fn expect_invalid(result: Result<(), ScantraderError>, expected_key: &str) {
        match result {
            Err(ScantraderError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn minimal_config_is_valid() {
        let config = MapConfig::new(&[("simulation", "target_pct", "0.05")]);
        assert!(validate_run_config(&config).is_ok());
    }

    #[test]
    fn full_config_is_valid() {
        let config = MapConfig::new(&[
            ("simulation", "target_pct", "0.10"),
            ("simulation", "swing_lookback", "10"),
            ("simulation", "forward_days", "5"),
            ("simulation", "use_atr_stop", "no"),
            ("simulation", "timeframe", "1wk"),
            ("weekly", "starting_capital", "250000"),
        ]);
        assert!(validate_run_config(&config).is_ok());
    }

    #[test]
    fn target_pct_has_no_default() {
        let config = MapConfig::new(&[]);
        match validate_run_config(&config) {
            Err(ScantraderError::ConfigMissing { section, key }) => {
                assert_eq!(section, "simulation");
                assert_eq!(key, "target_pct");
            }
            other => panic!("expected ConfigMissing, got {other:?}"),
        }
    }

    #[test]
    fn target_pct_must_be_positive_number() {
        expect_invalid(
            validate_run_config(&MapConfig::new(&[("simulation", "target_pct", "0")])),
            "target_pct",
        );
        expect_invalid(
            validate_run_config(&MapConfig::new(&[("simulation", "target_pct", "five")])),
            "target_pct",
        );
    }

    #[test]
    fn swing_lookback_must_be_positive() {
        let config = MapConfig::new(&[
            ("simulation", "target_pct", "0.05"),
            ("simulation", "swing_lookback", "0"),
        ]);
        expect_invalid(validate_run_config(&config), "swing_lookback");
    }

    #[test]
    fn forward_days_rejects_negative() {
        let config = MapConfig::new(&[
            ("simulation", "target_pct", "0.05"),
            ("simulation", "forward_days", "-1"),
        ]);
        expect_invalid(validate_run_config(&config), "forward_days");
    }

    #[test]
    fn use_atr_stop_must_be_boolean() {
        let config = MapConfig::new(&[
            ("simulation", "target_pct", "0.05"),
            ("simulation", "use_atr_stop", "maybe"),
        ]);
        expect_invalid(validate_run_config(&config), "use_atr_stop");
    }

    #[test]
    fn timeframe_must_be_known() {
        let config = MapConfig::new(&[
            ("simulation", "target_pct", "0.05"),
            ("simulation", "timeframe", "4h"),
        ]);
        expect_invalid(validate_run_config(&config), "timeframe");
    }

    #[test]
    fn starting_capital_must_be_positive() {
        let config = MapConfig::new(&[
            ("simulation", "target_pct", "0.05"),
            ("weekly", "starting_capital", "-5"),
        ]);
        expect_invalid(validate_run_config(&config), "starting_capital");
    }

    #[test]
    fn parse_optional_treats_blank_as_absent() {
        let config = MapConfig::new(&[("simulation", "forward_days", "  ")]);
        assert_eq!(
            parse_optional::<i64>(&config, "simulation", "forward_days").unwrap(),
            None
        );
    }
}
