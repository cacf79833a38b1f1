use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, Type};
use std::fmt;
use uuid::Uuid;

/// Local order status
///
/// `New` and `Processing` are pending; `Processed` and `Invalid` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "order_status", rename_all = "UPPERCASE")]
pub enum OrderStatus {
    New,
    Processing,
    Processed,
    Invalid,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Processed => "PROCESSED",
            OrderStatus::Invalid => "INVALID",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Processed | OrderStatus::Invalid)
    }
}

/// Status as reported by the accrual oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Invalid,
    Processing,
    Processed,
}

impl AccrualStatus {
    /// `Registered` means the oracle accepted the order but has not finished it.
    pub fn to_order_status(self) -> OrderStatus {
        match self {
            AccrualStatus::Registered | AccrualStatus::Processing => OrderStatus::Processing,
            AccrualStatus::Processed => OrderStatus::Processed,
            AccrualStatus::Invalid => OrderStatus::Invalid,
        }
    }
}

///User entity
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub login: String,
    pub password_hash: String,
    pub balance: Decimal,
    pub withdrawn: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Spendable and lifetime-withdrawn points of one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Balance {
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

/// Order entity
///
/// INVARIANT: `accrual.is_some() == (status == Processed)`
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub number: String,
    pub status: OrderStatus,
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn scan_key(&self) -> ScanKey {
        ScanKey {
            uploaded_at: self.uploaded_at,
            id: self.id,
        }
    }
}

/// Position in the pending scan, ordered by upload time then id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScanKey {
    pub uploaded_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Withdrawal entity - immutable once recorded
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Withdrawal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

/// A status write the order ledger may apply to a pending order.
///
/// Constructed only through [`OrderTransition::new`], which keeps the
/// accrual-iff-processed invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTransition {
    status: OrderStatus,
    accrual: Option<Decimal>,
}

impl OrderTransition {
    /// Returns `None` for a transition back to `New` or a negative accrual.
    ///
    /// A `Processed` transition without an accrual records zero; any other
    /// status drops the accrual.
    pub fn new(status: OrderStatus, accrual: Option<Decimal>) -> Option<Self> {
        match status {
            OrderStatus::New => None,
            OrderStatus::Processed => {
                let accrual = accrual.unwrap_or(Decimal::ZERO);
                if accrual < Decimal::ZERO {
                    return None;
                }
                Some(Self { status, accrual: Some(accrual) })
            }
            OrderStatus::Processing | OrderStatus::Invalid => Some(Self { status, accrual: None }),
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn accrual(&self) -> Option<Decimal> {
        self.accrual
    }
}

/// Balance increase owed to a user for one processed order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credit {
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub amount: Decimal,
}

/// Result of a guarded transition write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Status (and accrual) written; `credited` holds the amount added to the
    /// owner's balance in the same unit, if any.
    Applied { credited: Option<Decimal> },
    /// The order was already terminal (or already in the requested state);
    /// nothing was written.
    Unchanged,
}

/// Result of claiming an order number for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderSubmission {
    Accepted(Order),
    AlreadyUploaded(Order),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_terminal_states() {
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
        assert!(OrderStatus::Processed.is_terminal());
        assert!(OrderStatus::Invalid.is_terminal());
    }

    #[test]
    fn test_registered_maps_to_processing() {
        assert_eq!(AccrualStatus::Registered.to_order_status(), OrderStatus::Processing);
        assert_eq!(AccrualStatus::Processing.to_order_status(), OrderStatus::Processing);
        assert_eq!(AccrualStatus::Processed.to_order_status(), OrderStatus::Processed);
        assert_eq!(AccrualStatus::Invalid.to_order_status(), OrderStatus::Invalid);
    }

    #[test]
    fn test_transition_keeps_accrual_only_when_processed() {
        let processed = OrderTransition::new(OrderStatus::Processed, Some(dec!(500))).unwrap();
        assert_eq!(processed.accrual(), Some(dec!(500)));

        let processed_without = OrderTransition::new(OrderStatus::Processed, None).unwrap();
        assert_eq!(processed_without.accrual(), Some(Decimal::ZERO));

        let processing = OrderTransition::new(OrderStatus::Processing, Some(dec!(10))).unwrap();
        assert_eq!(processing.accrual(), None);

        let invalid = OrderTransition::new(OrderStatus::Invalid, None).unwrap();
        assert_eq!(invalid.accrual(), None);
    }

    #[test]
    fn test_transition_rejects_new_and_negative_accrual() {
        assert!(OrderTransition::new(OrderStatus::New, None).is_none());
        assert!(OrderTransition::new(OrderStatus::Processed, Some(dec!(-1))).is_none());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");

        let status: AccrualStatus = serde_json::from_str("\"REGISTERED\"").unwrap();
        assert_eq!(status, AccrualStatus::Registered);
    }
}
