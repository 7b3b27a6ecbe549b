//! Payment lifecycle.
//!
//! Exit flow: quote the fee, create an intent (VietQR or manual transfer),
//! confirm it, then call vehicle_out. Cash skips the intent step and is PAID
//! on insert. Confirming links the payment onto the plate's open
//! transaction when one exists.

use std::sync::Arc;

use tracing::info;
use url::form_urlencoded;
use uuid::Uuid;

use crate::config::BankConfig;
use crate::domain::{
    DomainResult, Payment, PaymentMethod, PaymentStatus, RepositoryProvider,
};
use crate::support::time;

/// Bank-QR image base; the bank app resolves the transfer from the query
const VIETQR_IMAGE_BASE: &str = "https://img.vietqr.io/image";

/// A freshly created payment intent
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub payment: Payment,
    /// Only set for VietQR intents
    pub vietqr_url: Option<String>,
}

pub struct PaymentService {
    repos: Arc<dyn RepositoryProvider>,
    bank: BankConfig,
}

impl PaymentService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, bank: BankConfig) -> Self {
        Self { repos, bank }
    }

    pub fn bank(&self) -> &BankConfig {
        &self.bank
    }

    /// Create a PENDING VietQR intent and the QR image URL for it.
    pub async fn create_vietqr(
        &self,
        plate: &str,
        gate: Option<String>,
        amount: i64,
    ) -> DomainResult<PaymentIntent> {
        let payment = self
            .create_pending(plate, gate, amount, PaymentMethod::Vietqr)
            .await?;
        let url = self.vietqr_url(
            amount,
            payment.transfer_content.as_deref().unwrap_or_default(),
        );
        Ok(PaymentIntent {
            payment,
            vietqr_url: Some(url),
        })
    }

    /// Create a PENDING manual-transfer intent.
    pub async fn create_manual(
        &self,
        plate: &str,
        gate: Option<String>,
        amount: i64,
    ) -> DomainResult<PaymentIntent> {
        let payment = self
            .create_pending(plate, gate, amount, PaymentMethod::OnlineManual)
            .await?;
        Ok(PaymentIntent {
            payment,
            vietqr_url: None,
        })
    }

    async fn create_pending(
        &self,
        plate: &str,
        gate: Option<String>,
        amount: i64,
        method: PaymentMethod,
    ) -> DomainResult<Payment> {
        let payment_id = Uuid::new_v4().to_string();
        let transfer_content = transfer_content_for(&payment_id);

        let payment = Payment {
            payment_id,
            plate: plate.to_string(),
            gateid: gate,
            amount,
            method,
            status: PaymentStatus::Pending,
            transfer_content: Some(transfer_content),
            created_at: time::now(),
            paid_at: None,
        };
        self.repos.payments().insert(payment.clone()).await?;

        info!(
            payment_id = payment.payment_id.as_str(),
            plate,
            amount,
            method = method.as_str(),
            "Payment intent created"
        );
        Ok(payment)
    }

    /// PENDING → PAID, then link onto the plate's open transaction.
    pub async fn confirm_manual(&self, payment_id: &str) -> DomainResult<Payment> {
        let payment = self.repos.payments().mark_paid(payment_id).await?;
        self.link_to_open_transaction(&payment).await?;

        info!(payment_id, plate = payment.plate.as_str(), "Payment confirmed");
        Ok(payment)
    }

    /// Record a cash payment; PAID immediately.
    pub async fn confirm_cash(
        &self,
        plate: &str,
        gate: Option<String>,
        amount: i64,
    ) -> DomainResult<Payment> {
        let now = time::now();
        let payment = Payment {
            payment_id: Uuid::new_v4().to_string(),
            plate: plate.to_string(),
            gateid: gate,
            amount,
            method: PaymentMethod::Cash,
            status: PaymentStatus::Paid,
            transfer_content: None,
            created_at: now,
            paid_at: Some(now),
        };
        self.repos.payments().insert(payment.clone()).await?;
        self.link_to_open_transaction(&payment).await?;

        info!(
            payment_id = payment.payment_id.as_str(),
            plate, amount, "Cash payment recorded"
        );
        Ok(payment)
    }

    async fn link_to_open_transaction(&self, payment: &Payment) -> DomainResult<()> {
        if let Some(open) = self
            .repos
            .transactions()
            .find_open_for_plate(&payment.plate)
            .await?
        {
            self.repos
                .transactions()
                .set_payment_id(open.trans_id, &payment.payment_id)
                .await?;
        }
        Ok(())
    }

    /// VietQR image URL for an amount and transfer memo.
    pub fn vietqr_url(&self, amount: i64, add_info: &str) -> String {
        vietqr_url(&self.bank, amount, add_info)
    }
}

/// VietQR image URL for the configured account, amount and transfer memo.
pub fn vietqr_url(bank: &BankConfig, amount: i64, add_info: &str) -> String {
    let base = format!(
        "{}/{}-{}-compact2.png",
        VIETQR_IMAGE_BASE, bank.bank_code, bank.account_no
    );
    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("amount", &amount.to_string())
        .append_pair("addInfo", add_info)
        .append_pair("accountName", &bank.account_name)
        .finish();
    format!("{}?{}", base, query)
}

/// `PARK-` + first 8 uuid chars, uppercased — the memo the guard matches
/// against the bank statement.
fn transfer_content_for(payment_id: &str) -> String {
    let prefix: String = payment_id.chars().take(8).collect();
    format!("PARK-{}", prefix.to_uppercase())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::events::EventBus;
    use crate::application::mutations::{MutationEngine, VehicleInRequest};
    use crate::application::reservations::ReservationRegistry;
    use crate::domain::DomainError;
    use crate::infrastructure::database::entities::{gate, slot};
    use crate::infrastructure::database::migrator::Migrator;
    use crate::infrastructure::database::repositories::SeaOrmRepositoryProvider;
    use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
    use sea_orm_migration::MigratorTrait;

    fn test_bank() -> BankConfig {
        BankConfig {
            bank_code: "MB".into(),
            account_no: "4506120217".into(),
            account_name: "NGUYEN THANH THINH".into(),
        }
    }

    /// Store with one gate, one slot and one open transaction for P1
    async fn service_with_open_stay() -> (PaymentService, Arc<dyn RepositoryProvider>) {
        let mut opts = ConnectOptions::new("sqlite::memory:");
        opts.max_connections(1).sqlx_logging(false);
        let db = Database::connect(opts).await.unwrap();
        Migrator::up(&db, None).await.unwrap();

        gate::ActiveModel {
            gateid: Set("G_N".into()),
            x: Set(0.0),
            y: Set(0.0),
            last_sync: Set(None),
            role: Set("guard".into()),
        }
        .insert(&db)
        .await
        .unwrap();
        slot::ActiveModel {
            slotid: Set("A1".into()),
            zone: Set("A".into()),
            x: Set(0.0),
            y: Set(0.0),
            occupied: Set(false),
            plate: Set(None),
            version: Set(0),
        }
        .insert(&db)
        .await
        .unwrap();

        let engine =
            MutationEngine::new(db.clone(), ReservationRegistry::shared(), EventBus::shared());
        engine
            .vehicle_in(VehicleInRequest {
                plate: "P1".into(),
                gate: "G_N".into(),
                slot: "A1".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let repos: Arc<dyn RepositoryProvider> = Arc::new(SeaOrmRepositoryProvider::new(db));
        (PaymentService::new(repos.clone(), test_bank()), repos)
    }

    #[tokio::test]
    async fn vietqr_intent_is_pending_with_memo_and_url() {
        let (svc, repos) = service_with_open_stay().await;

        let intent = svc
            .create_vietqr("P1", Some("G_S".into()), 11_000)
            .await
            .unwrap();
        assert_eq!(intent.payment.status, PaymentStatus::Pending);
        assert!(intent
            .payment
            .transfer_content
            .as_deref()
            .unwrap()
            .starts_with("PARK-"));
        assert!(intent.vietqr_url.as_deref().unwrap().contains("amount=11000"));

        let stored = repos
            .payments()
            .find_by_id(&intent.payment.payment_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_paid());
        assert!(stored.paid_at.is_none());
    }

    #[tokio::test]
    async fn confirm_manual_pays_and_links_open_transaction() {
        let (svc, repos) = service_with_open_stay().await;

        let intent = svc.create_manual("P1", None, 5000).await.unwrap();
        assert!(intent.vietqr_url.is_none());

        let paid = svc.confirm_manual(&intent.payment.payment_id).await.unwrap();
        assert!(paid.is_paid());
        assert!(paid.paid_at.is_some());

        let open = repos
            .transactions()
            .find_open_for_plate("P1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(open.payment_id.as_deref(), Some(paid.payment_id.as_str()));
    }

    #[tokio::test]
    async fn confirm_unknown_payment_is_not_found() {
        let (svc, _) = service_with_open_stay().await;
        let err = svc.confirm_manual("no-such-payment").await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn cash_is_paid_on_insert_and_links() {
        let (svc, repos) = service_with_open_stay().await;

        let payment = svc
            .confirm_cash("P1", Some("G_N".into()), 8000)
            .await
            .unwrap();
        assert!(payment.is_paid());
        assert_eq!(payment.method, PaymentMethod::Cash);
        assert!(payment.transfer_content.is_none());

        let open = repos
            .transactions()
            .find_open_for_plate("P1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            open.payment_id.as_deref(),
            Some(payment.payment_id.as_str())
        );
    }

    #[tokio::test]
    async fn payment_without_open_transaction_still_succeeds() {
        let (svc, repos) = service_with_open_stay().await;

        // No open stay for this plate — linkage is skipped, payment recorded
        let payment = svc.confirm_cash("GHOST", None, 5000).await.unwrap();
        assert!(payment.is_paid());
        let history = repos.payments().find_for_plate("GHOST").await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn transfer_content_shape() {
        let content = transfer_content_for("a1b2c3d4-0000-0000-0000-000000000000");
        assert_eq!(content, "PARK-A1B2C3D4");
    }

    #[test]
    fn vietqr_url_encodes_query() {
        let bank = BankConfig {
            bank_code: "MB".into(),
            account_no: "4506120217".into(),
            account_name: "NGUYEN THANH THINH".into(),
        };
        let url = vietqr_url(&bank, 11_000, "PARK-A1B2C3D4");

        assert!(url.starts_with("https://img.vietqr.io/image/MB-4506120217-compact2.png?"));
        assert!(url.contains("amount=11000"));
        assert!(url.contains("addInfo=PARK-A1B2C3D4"));
        assert!(url.contains("accountName=NGUYEN+THANH+THINH"));
    }
}
