//! HTTP client the Gate Node uses to talk to the Cloud.
//!
//! Every call carries an explicit timeout (health 1.5 s, snapshot 5 s,
//! mutations 8 s, uploads 10 s); a timeout is a failure and the durable
//! queue retries. Rejections keep their HTTP status so the drainer can tell
//! terminal conflicts from transient trouble.

use std::time::Duration;

use reqwest::multipart;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::gate::store::SnapshotSlot;
use crate::infrastructure::images::ImageKind;

const HEALTH_TIMEOUT: Duration = Duration::from_millis(1500);
const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(5);
const MUTATION_TIMEOUT: Duration = Duration::from_secs(8);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CloudCallError {
    /// Transport-level failure (unreachable, timed out, bad body)
    #[error("cloud unreachable: {0}")]
    Network(#[from] reqwest::Error),

    /// The Cloud answered with a non-success status
    #[error("cloud rejected ({status}): {detail}")]
    Rejected { status: StatusCode, detail: String },
}

impl CloudCallError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            CloudCallError::Rejected { status, .. } => Some(*status),
            CloudCallError::Network(_) => None,
        }
    }
}

pub struct CloudClient {
    base: String,
    token: String,
    client: reqwest::Client,
}

impl CloudClient {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Quick liveness probe; anything but a timely 200 counts as down.
    pub async fn health_ok(&self) -> bool {
        let res = self
            .client
            .get(format!("{}/health", self.base))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;
        matches!(res, Ok(r) if r.status().is_success())
    }

    /// Pull the authoritative slot list.
    pub async fn fetch_slots_map(&self) -> Result<Vec<SnapshotSlot>, CloudCallError> {
        let res = self
            .client
            .get(format!("{}/slots/map", self.base))
            .timeout(SNAPSHOT_TIMEOUT)
            .send()
            .await?;

        let res = Self::check_status(res).await?;
        let body: Value = res.json().await?;
        let slots = body
            .get("slots")
            .cloned()
            .unwrap_or(Value::Array(vec![]));
        let slots: Vec<SnapshotSlot> = serde_json::from_value(slots).unwrap_or_default();
        Ok(slots)
    }

    /// Authoritative state of one slot, for reconciliation reports.
    pub async fn fetch_slot_state(&self, slotid: &str) -> Option<Value> {
        let res = self
            .client
            .get(format!("{}/slots/map", self.base))
            .timeout(SNAPSHOT_TIMEOUT)
            .send()
            .await
            .ok()?;
        let body: Value = res.json().await.ok()?;
        body.get("slots")?
            .as_array()?
            .iter()
            .find(|s| s.get("slotid").and_then(|v| v.as_str()) == Some(slotid))
            .cloned()
    }

    /// POST a vehicle mutation (`/vehicle_in` or `/vehicle_out`).
    pub async fn post_mutation(
        &self,
        endpoint: &str,
        payload: &Value,
    ) -> Result<Value, CloudCallError> {
        debug!(endpoint, "Pushing mutation to cloud");
        let res = self
            .client
            .post(format!("{}{}", self.base, endpoint))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .timeout(MUTATION_TIMEOUT)
            .json(payload)
            .send()
            .await?;

        let res = Self::check_status(res).await?;
        Ok(res.json().await?)
    }

    /// Upload an image file; returns the cloud-side path on success.
    pub async fn upload_image(
        &self,
        kind: ImageKind,
        local_path: &str,
        plate: &str,
        gate: &str,
    ) -> Result<String, CloudCallError> {
        let bytes = tokio::fs::read(local_path).await.map_err(|e| {
            CloudCallError::Rejected {
                status: StatusCode::BAD_REQUEST,
                detail: format!("cannot read {}: {}", local_path, e),
            }
        })?;

        let filename = std::path::Path::new(local_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());

        let part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("image/jpeg")
            .map_err(CloudCallError::Network)?;
        let form = multipart::Form::new()
            .text("plate", plate.to_string())
            .text("gate", gate.to_string())
            .part("file", part);

        let endpoint = match kind {
            ImageKind::In => "/upload_image_in",
            ImageKind::Out => "/upload_image_out",
        };

        let res = self
            .client
            .post(format!("{}{}", self.base, endpoint))
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await?;

        let res = Self::check_status(res).await?;
        let body: Value = res.json().await?;
        body.get("path")
            .and_then(|p| p.as_str())
            .map(String::from)
            .ok_or(CloudCallError::Rejected {
                status: StatusCode::BAD_GATEWAY,
                detail: "upload response carried no path".into(),
            })
    }

    async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, CloudCallError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let detail = match res.json::<Value>().await {
            Ok(body) => body
                .get("detail")
                .and_then(|d| d.as_str())
                .map(String::from)
                .unwrap_or_else(|| body.to_string()),
            Err(_) => status.to_string(),
        };
        Err(CloudCallError::Rejected { status, detail })
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = CloudClient::new("http://cloud:8010/", "secret-key");
        assert_eq!(client.base(), "http://cloud:8010");
    }

    #[test]
    fn rejected_carries_status() {
        let err = CloudCallError::Rejected {
            status: StatusCode::CONFLICT,
            detail: "Slot A1 already has a vehicle".into(),
        };
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert!(err.to_string().contains("409"));
    }

    #[tokio::test]
    async fn health_check_fails_fast_when_unreachable() {
        // Nothing listens on this port; the probe must come back false
        let client = CloudClient::new("http://127.0.0.1:59999", "secret-key");
        assert!(!client.health_ok().await);
    }
}
