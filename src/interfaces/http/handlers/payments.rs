//! Payment handlers: VietQR / manual intents, confirmations, cash

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::interfaces::http::router::CloudState;
use crate::support::errors::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub plate: Option<String>,
    pub gate: Option<String>,
    pub amount: Option<i64>,
}

fn parse_intent_fields(
    req: CreatePaymentRequest,
) -> Result<(String, Option<String>, i64), ApiError> {
    let plate = req
        .plate
        .map(|p| p.trim().to_uppercase())
        .filter(|p| !p.is_empty());
    let gate = req
        .gate
        .map(|g| g.trim().to_uppercase())
        .filter(|g| !g.is_empty());
    let amount = req.amount.unwrap_or(0);

    match plate {
        Some(plate) if amount > 0 => Ok((plate, gate, amount)),
        _ => Err(ApiError::BadInput("missing plate/amount".into())),
    }
}

/// `POST /payments/vietqr/create`: PENDING intent + bank-QR URL
pub async fn vietqr_create(
    State(state): State<CloudState>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<Value>, ApiError> {
    let (plate, gate, amount) = parse_intent_fields(req)?;
    let intent = state.payments.create_vietqr(&plate, gate, amount).await?;
    let bank = state.payments.bank();

    Ok(Json(json!({
        "ok": true,
        "payment_id": intent.payment.payment_id,
        "amount": amount,
        "transfer_content": intent.payment.transfer_content,
        "bank_info": {
            "bank_code": bank.bank_code,
            "account_no": bank.account_no,
            "account_name": bank.account_name,
        },
        "vietqr_url": intent.vietqr_url,
        "status": "PENDING",
    })))
}

/// `POST /payments/manual/create`: PENDING manual-transfer intent
pub async fn manual_create(
    State(state): State<CloudState>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<Value>, ApiError> {
    let (plate, gate, amount) = parse_intent_fields(req)?;
    let intent = state.payments.create_manual(&plate, gate, amount).await?;
    let bank = state.payments.bank();

    Ok(Json(json!({
        "ok": true,
        "payment_id": intent.payment.payment_id,
        "bank_info": {
            "bank_code": bank.bank_code,
            "account_no": bank.account_no,
            "account_name": bank.account_name,
        },
        "transfer_content": intent.payment.transfer_content,
        "status": "PENDING",
    })))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub payment_id: Option<String>,
}

/// `POST /payments/manual/confirm`: guard saw the transfer; PENDING → PAID
pub async fn manual_confirm(
    State(state): State<CloudState>,
    Json(req): Json<ConfirmPaymentRequest>,
) -> Result<Json<Value>, ApiError> {
    let payment_id = req
        .payment_id
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadInput("missing payment_id".into()))?;

    let payment = state.payments.confirm_manual(&payment_id).await?;

    Ok(Json(json!({
        "ok": true,
        "payment_id": payment.payment_id,
        "status": "PAID",
    })))
}

/// `POST /payments/cash/confirm`: recorded directly as PAID
pub async fn cash_confirm(
    State(state): State<CloudState>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<Value>, ApiError> {
    let (plate, gate, amount) = parse_intent_fields(req)?;
    let payment = state.payments.confirm_cash(&plate, gate, amount).await?;

    Ok(Json(json!({
        "ok": true,
        "payment_id": payment.payment_id,
        "status": "PAID",
    })))
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_fields_require_plate_and_positive_amount() {
        let ok = parse_intent_fields(CreatePaymentRequest {
            plate: Some(" 51h-123.45 ".into()),
            gate: Some("g_s".into()),
            amount: Some(11_000),
        })
        .unwrap();
        assert_eq!(ok, ("51H-123.45".into(), Some("G_S".into()), 11_000));

        assert!(parse_intent_fields(CreatePaymentRequest {
            plate: None,
            gate: None,
            amount: Some(5000),
        })
        .is_err());

        assert!(parse_intent_fields(CreatePaymentRequest {
            plate: Some("P1".into()),
            gate: None,
            amount: Some(0),
        })
        .is_err());
    }
}
