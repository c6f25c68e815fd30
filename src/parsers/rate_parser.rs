use std::str::FromStr;

use log::debug;
use serde_json::Value as JsonValue;

use crate::error::RateParseError;

/// Separates the mean from the standard deviation in a rate cell.
pub const MEAN_STD_DELIMITER: char = '±';

/// A modification-rate cell, parsed once at ingestion.
///
/// Cells are either a plain number (`0.05`) or a replicate summary written as
/// `"mean ± std"` (`"0.084891 ± 0.170510"`). Only the mean takes part in the
/// analysis; the standard deviation is kept for reporting.
///
/// # Example
///
/// ```rust
/// use mod_rate::parsers::rate_parser::RateCell;
///
/// let cell: RateCell = "0.084891 ± 0.170510".parse().unwrap();
/// assert_eq!(cell, RateCell::MeanStd { mean: 0.084891, std: 0.170510 });
/// assert_eq!(cell.mean(), 0.084891);
///
/// assert_eq!("0.5".parse::<RateCell>().unwrap(), RateCell::Numeric(0.5));
/// assert!("garbage".parse::<RateCell>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateCell {
    Numeric(f64),
    MeanStd { mean: f64, std: f64 },
}

impl RateCell {
    pub fn mean(&self) -> f64 {
        match self {
            RateCell::Numeric(value) => *value,
            RateCell::MeanStd { mean, .. } => *mean,
        }
    }

    pub fn std(&self) -> Option<f64> {
        match self {
            RateCell::Numeric(_) => None,
            RateCell::MeanStd { std, .. } => Some(*std),
        }
    }

    /// Reads a cell from a JSON gene table. Numbers are taken as they are,
    /// strings go through the same parser as text tables.
    pub fn from_json(value: &JsonValue) -> Result<Self, RateParseError> {
        match value {
            JsonValue::Number(number) => number
                .as_f64()
                .map(RateCell::Numeric)
                .ok_or_else(|| RateParseError::Invalid(number.to_string())),
            JsonValue::String(text) => text.parse(),
            JsonValue::Null => Err(RateParseError::Empty),
            other => Err(RateParseError::Invalid(other.to_string())),
        }
    }
}

impl FromStr for RateCell {
    type Err = RateParseError;

    /// Only the part before the first `±` has to be a number. A standard
    /// deviation that does not parse leaves a plain numeric cell.
    fn from_str(cell: &str) -> Result<Self, Self::Err> {
        let (head, tail) = match cell.split_once(MEAN_STD_DELIMITER) {
            Some((head, tail)) => (head, Some(tail)),
            None => (cell, None),
        };

        let mean = parse_finite(head, cell)?;
        let std = tail.and_then(|tail| parse_finite(tail, cell).ok());

        Ok(match std {
            Some(std) => RateCell::MeanStd { mean, std },
            None => RateCell::Numeric(mean),
        })
    }
}

fn parse_finite(text: &str, cell: &str) -> Result<f64, RateParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(RateParseError::Empty);
    }
    let value: f64 = text
        .parse()
        .map_err(|_| RateParseError::Invalid(cell.to_string()))?;
    if !value.is_finite() {
        return Err(RateParseError::NonFinite(cell.to_string()));
    }
    Ok(value)
}

/// Parses a rate cell, falling back to `0.0` when it is not a number.
///
/// ```rust
/// use mod_rate::parsers::rate_parser::parse_rate;
///
/// assert!((parse_rate("0.084891 ± 0.170510") - 0.084891).abs() < 1e-12);
/// assert_eq!(parse_rate("garbage"), 0.0);
/// ```
pub fn parse_rate(cell: &str) -> f64 {
    rate_or_zero(&cell.parse())
}

/// Applies the zero default to an already parsed cell.
pub fn rate_or_zero(cell: &Result<RateCell, RateParseError>) -> f64 {
    match cell {
        Ok(cell) => cell.mean(),
        Err(e) => {
            debug!("Using a rate of 0.0: {}", e);
            0.0
        }
    }
}
