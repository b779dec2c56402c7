use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};
use crate::price_infra::normalize_symbol;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Above,
    Below,
}

impl Comparison {
    /// Strict comparison: a price equal to the threshold matches neither side.
    pub fn matches(&self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::Above => value > threshold,
            Comparison::Below => value < threshold,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Above => write!(f, "above"),
            Comparison::Below => write!(f, "below"),
        }
    }
}

/// `"<SYMBOL> <above|below> <threshold>"`, e.g. `"NEO above 10.5"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceAlertCondition {
    pub symbol: String,
    pub comparison: Comparison,
    pub threshold: f64,
}

impl PriceAlertCondition {
    pub fn is_met(&self, price: f64) -> bool {
        self.comparison.matches(price, self.threshold)
    }
}

impl FromStr for PriceAlertCondition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidCondition {
            condition: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split_whitespace().collect();
        let [symbol, comparison, threshold] = parts.as_slice() else {
            return Err(invalid("expected '<symbol> <above|below> <threshold>'"));
        };

        let comparison = match comparison.to_ascii_lowercase().as_str() {
            "above" => Comparison::Above,
            "below" => Comparison::Below,
            _ => return Err(invalid("comparison must be 'above' or 'below'")),
        };

        let threshold: f64 = threshold.parse()
            .map_err(|_| invalid("threshold is not a number"))?;
        if !threshold.is_finite() {
            return Err(invalid("threshold must be finite"));
        }

        Ok(PriceAlertCondition {
            symbol: normalize_symbol(symbol),
            comparison,
            threshold,
        })
    }
}

impl fmt::Display for PriceAlertCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.symbol, self.comparison, self.threshold)
    }
}
