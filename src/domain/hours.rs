//! Hours type
//!
//! Domain primitive for effort estimates and recorded effort.
//! All values are validated at construction time, ensuring invalid values
//! cannot exist in the system.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum allowed effort for a single task (10,000 hours)
const MAX_HOURS: i64 = 10_000;

/// Maximum decimal places (2)
const MAX_SCALE: u32 = 2;

/// Hours represents a validated, non-negative effort value.
///
/// # Invariants
/// - Value is never negative
/// - Maximum 2 decimal places
/// - Maximum value is 10,000 hours
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use task_chronicle::domain::Hours;
///
/// let estimate = Hours::new(Decimal::new(40, 0)).unwrap();
/// assert_eq!(estimate.value(), Decimal::new(40, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hours(Decimal);

/// Errors that can occur when creating an Hours value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HoursError {
    #[error("Hours must not be negative (got {0})")]
    Negative(Decimal),

    #[error("Hours have too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Hours exceed maximum allowed value ({MAX_HOURS})")]
    Overflow,

    #[error("Invalid hours format: {0}")]
    ParseError(String),
}

impl Hours {
    /// Zero hours.
    pub const ZERO: Hours = Hours(Decimal::ZERO);

    /// Create a new Hours value with validation.
    ///
    /// # Errors
    /// - `HoursError::Negative` if value < 0
    /// - `HoursError::TooManyDecimals` if more than 2 decimal places
    /// - `HoursError::Overflow` if value > 10,000
    pub fn new(value: Decimal) -> Result<Self, HoursError> {
        if value < Decimal::ZERO {
            return Err(HoursError::Negative(value));
        }

        if value.normalize().scale() > MAX_SCALE {
            return Err(HoursError::TooManyDecimals(value.scale()));
        }

        if value > Decimal::from(MAX_HOURS) {
            return Err(HoursError::Overflow);
        }

        Ok(Self(value.normalize()))
    }

    /// Create an Hours value from whole hours.
    pub fn from_integer(value: i64) -> Result<Self, HoursError> {
        Self::new(Decimal::from(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Default for Hours {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Display for Hours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}h", self.0)
    }
}

impl FromStr for Hours {
    type Err = HoursError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal =
            Decimal::from_str(s.trim()).map_err(|e| HoursError::ParseError(e.to_string()))?;
        Hours::new(decimal)
    }
}

impl TryFrom<String> for Hours {
    type Error = HoursError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Hours::from_str(&value)
    }
}

impl TryFrom<Decimal> for Hours {
    type Error = HoursError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Hours::new(value)
    }
}

impl From<Hours> for String {
    fn from(hours: Hours) -> Self {
        hours.0.to_string()
    }
}
