//! Payment domain entity
//!
//! `PENDING → PAID`, terminal. Cash payments are PAID on creation. A
//! transaction is billable-closed only once a PAID payment exists for its
//! plate.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::domain::DomainResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Vietqr,
    OnlineManual,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vietqr => "vietqr",
            Self::OnlineManual => "online_manual",
            Self::Cash => "cash",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "vietqr" => Self::Vietqr,
            "cash" => Self::Cash,
            _ => Self::OnlineManual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "PAID" => Self::Paid,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// UUID, minted at intent creation
    pub payment_id: String,
    pub plate: String,
    pub gateid: Option<String>,
    /// Currency units are opaque to the core
    pub amount: i64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Bank-transfer memo, `PARK-` + first 8 uuid chars uppercased
    pub transfer_content: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub paid_at: Option<DateTime<FixedOffset>>,
}

impl Payment {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: Payment) -> DomainResult<()>;

    async fn find_by_id(&self, payment_id: &str) -> DomainResult<Option<Payment>>;

    /// PENDING → PAID with `paid_at = now`. NotFound when the id is unknown.
    async fn mark_paid(&self, payment_id: &str) -> DomainResult<Payment>;

    /// Payment history for a plate, newest first
    async fn find_for_plate(&self, plate: &str) -> DomainResult<Vec<Payment>>;
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_roundtrip() {
        for m in [
            PaymentMethod::Vietqr,
            PaymentMethod::OnlineManual,
            PaymentMethod::Cash,
        ] {
            assert_eq!(PaymentMethod::from_str(m.as_str()), m);
        }
    }

    #[test]
    fn status_roundtrip() {
        assert_eq!(PaymentStatus::from_str("PAID"), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::from_str("PENDING"), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_str("garbage"), PaymentStatus::Pending);
    }

    #[test]
    fn status_serializes_uppercase() {
        let json = serde_json::to_string(&PaymentStatus::Pending).unwrap();
        assert_eq!(json, "\"PENDING\"");
    }
}
