//! Candlestick classification for a single OHLC bar.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandleType {
    Doji,
    Hammer,
    HangingMan,
    InvertedHammer,
    ShootingStar,
    BullishMarubozu,
    BearishMarubozu,
    Bullish,
    Bearish,
}

impl fmt::Display for CandleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CandleType::Doji => "Doji",
            CandleType::Hammer => "Hammer",
            CandleType::HangingMan => "Hanging Man",
            CandleType::InvertedHammer => "Inverted Hammer",
            CandleType::ShootingStar => "Shooting Star",
            CandleType::BullishMarubozu => "Bullish Marubozu",
            CandleType::BearishMarubozu => "Bearish Marubozu",
            CandleType::Bullish => "Bullish",
            CandleType::Bearish => "Bearish",
        };
        f.write_str(name)
    }
}

/// Classify a bar by body and shadow proportions.
///
/// Checks run in order: flat or unchanged bars are Doji, then a body under
/// 10% of the range is Doji, then hammer shapes (small body, one long
/// shadow), then marubozu (shadows under 5% of the body), else plain colour.
pub fn classify(open: f64, high: f64, low: f64, close: f64) -> CandleType {
    let range = high - low;
    if range == 0.0 {
        return CandleType::Doji;
    }

    let bullish = if close > open {
        true
    } else if close < open {
        false
    } else {
        return CandleType::Doji;
    };

    let body = (close - open).abs();
    let upper_shadow = high - open.max(close);
    let lower_shadow = open.min(close) - low;

    if body < 0.1 * range {
        return CandleType::Doji;
    }

    let small_body = body <= range * 0.3;

    if small_body && lower_shadow >= 2.0 * body && upper_shadow <= 0.3 * body {
        return if bullish {
            CandleType::Hammer
        } else {
            CandleType::HangingMan
        };
    }

    if small_body && upper_shadow >= 2.0 * body && lower_shadow <= 0.3 * body {
        return if bullish {
            CandleType::InvertedHammer
        } else {
            CandleType::ShootingStar
        };
    }

    if upper_shadow < 0.05 * body && lower_shadow < 0.05 * body {
        return if bullish {
            CandleType::BullishMarubozu
        } else {
            CandleType::BearishMarubozu
        };
    }

    if bullish {
        CandleType::Bullish
    } else {
        CandleType::Bearish
    }
}
