//! Core domain types and logic.

pub mod backtest;
pub mod candle;
pub mod cohort;
pub mod config_validation;
pub mod error;
pub mod indicator;
pub mod metrics;
pub mod price_bar;
pub mod price_series;
pub mod signal;
pub mod simulator;
