// src/models/status.rs
//! Status vocabularies, all generated through `define_status_enum!`.

use serde::{Deserialize, Serialize};

/// Generates a status enum with as_str and Display.
/// Stored spelling is the literal; serde matches it exactly.
macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $variant:ident => $str_val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        $vis enum $name {
            $( #[serde(rename = $str_val)] $variant ),+
        }

        impl $name {
            #[inline]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $str_val ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Severity of an audit finding
    pub enum Severity {
        Error => "error",
        Warning => "warning",
        Info => "info",
    }
}

define_status_enum! {
    /// What happened to a returned item
    pub enum ItemStatus {
        Damaged => "Damaged",
        Lost => "Lost",
    }
}

define_status_enum! {
    /// Settlement state of a damaged/lost record
    pub enum SettlementStatus {
        Pending => "Pending",
        Settled => "Settled",
    }
}

/// Status of a restriction entry that currently blocks borrowing
pub const ACTIVE_RESTRICTION: &str = "active";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_spelling() {
        assert_eq!(SettlementStatus::Pending.as_str(), "Pending");
        assert_eq!(serde_json::to_string(&ItemStatus::Lost).unwrap(), "\"Lost\"");
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"warning\"");
    }

    #[test]
    fn test_deserialization_is_exact() {
        assert_eq!(serde_json::from_str::<SettlementStatus>("\"Settled\"").unwrap(), SettlementStatus::Settled);
        assert!(serde_json::from_str::<SettlementStatus>("\"settled\"").is_err());
        assert_eq!(ItemStatus::Damaged.to_string(), "Damaged");
    }
}
