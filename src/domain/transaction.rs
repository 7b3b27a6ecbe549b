//! Parking transaction — the billable record of one park-and-leave cycle.
//!
//! Opened by vehicle_in, closed by vehicle_out together with its vehicle
//! row; duration and fee are computed at close time. `payment_id` is filled
//! in when a payment is confirmed for the plate.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::domain::DomainResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParkingTransaction {
    pub trans_id: i32,
    pub plate: String,
    pub slotid: String,
    pub gateid: String,
    pub time_in: DateTime<FixedOffset>,
    pub time_out: Option<DateTime<FixedOffset>>,
    pub duration_minutes: Option<i64>,
    pub fee: Option<i64>,
    pub img_in: Option<String>,
    pub img_out: Option<String>,
    pub payment_id: Option<String>,
}

impl ParkingTransaction {
    pub fn is_open(&self) -> bool {
        self.time_out.is_none()
    }
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Full history, newest first
    async fn find_all(&self) -> DomainResult<Vec<ParkingTransaction>>;

    /// The single open transaction for a plate, if any
    async fn find_open_for_plate(&self, plate: &str)
        -> DomainResult<Option<ParkingTransaction>>;

    /// Link a confirmed payment onto a transaction
    async fn set_payment_id(&self, trans_id: i32, payment_id: &str) -> DomainResult<()>;
}
