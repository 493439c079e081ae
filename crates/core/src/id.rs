//! Strongly-typed identifiers used across the domain.
//!
//! Sheet identifiers are free-form text, so every identifier is a trimmed,
//! non-empty string newtype.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Key of a row within a dataset (`code` for PO rows, `transferId` for DC rows).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(String);

/// Item code of a purchase-order line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemCode(String);

/// Identifier of a delivery challan (parent record).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(String);

macro_rules! impl_text_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Build an identifier from raw sheet text.
            ///
            /// Surrounding whitespace is trimmed; blank input is rejected.
            pub fn parse(raw: impl AsRef<str>) -> Result<Self, DomainError> {
                let trimmed = raw.as_ref().trim();
                if trimmed.is_empty() {
                    return Err(DomainError::invalid_id(concat!($name, " must not be blank")));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_text_newtype!(RowKey, "row key");
impl_text_newtype!(ItemCode, "item code");
impl_text_newtype!(TransferId, "transfer id");

impl From<ItemCode> for RowKey {
    fn from(value: ItemCode) -> Self {
        Self(value.0)
    }
}

impl From<TransferId> for RowKey {
    fn from(value: TransferId) -> Self {
        Self(value.0)
    }
}

impl From<RowKey> for ItemCode {
    fn from(value: RowKey) -> Self {
        Self(value.0)
    }
}

impl From<RowKey> for TransferId {
    fn from(value: RowKey) -> Self {
        Self(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims_whitespace() {
        let code = ItemCode::parse("  X1 ").unwrap();
        assert_eq!(code.as_str(), "X1");
    }

    #[test]
    fn blank_identifier_is_rejected() {
        let err = TransferId::parse("   ").unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(_)));
    }

    #[test]
    fn serializes_as_plain_string() {
        let key: RowKey = "DC-7".parse().unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"DC-7\"");
    }
}
