//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. To
/// "modify" one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// A strictly positive number of received units.
///
/// Every quantity handed to the remote gateway goes through this type, so the
/// transport never sees zero or negative values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(u32);

impl ValueObject for Quantity {}

impl Quantity {
    pub fn new(value: i64) -> Result<Self, DomainError> {
        if value <= 0 {
            return Err(DomainError::validation(
                "Please enter a quantity greater than 0.",
            ));
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| DomainError::validation(format!("quantity {value} is too large")))
    }

    /// Parse user input (e.g. the text of a quantity box).
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        let value: i64 = trimmed.parse().map_err(|_| {
            DomainError::validation(format!(
                "'{trimmed}' is not a whole number; please enter a quantity greater than 0."
            ))
        })?;
        Self::new(value)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        i64::from(value.0)
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}
