use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};

use reslock_core::types::{Holder, Timestamp};
use reslock_core::LockError;

// ─── Validation Helpers ─────────────────────────────────────────────────────

pub fn status_for(error: &LockError) -> StatusCode {
    match error {
        LockError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        LockError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Host applications often key resources and users by integer; accept both
/// JSON numbers and strings.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Unsigned(n) => n.to_string(),
        RawId::Signed(n) => n.to_string(),
    })
}

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AcquireLockRequest {
    pub resource_type: String,
    #[serde(deserialize_with = "id_string")]
    pub resource_id: String,
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
    /// Falls back to the server's default TTL when omitted
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

impl AcquireLockRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.resource_type.is_empty() {
            return Err("resource_type is required".to_string());
        }
        if self.resource_id.is_empty() {
            return Err("resource_id is required".to_string());
        }
        if self.user_id.is_empty() {
            return Err("user_id is required".to_string());
        }
        if self.ttl_secs == Some(0) {
            return Err("ttl_secs must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn ttl(&self, default: Duration) -> Duration {
        self.ttl_secs.map_or(default, Duration::from_secs)
    }
}

#[derive(Deserialize)]
pub struct SweepRequest {
    pub resource_type: String,
    #[serde(default)]
    pub resource_id: Option<String>,
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize)]
pub struct LockResponse {
    pub resource_type: String,
    pub resource_id: String,
    pub user_id: String,
    pub expires_at: Timestamp,
}

#[derive(Serialize)]
pub struct HoldersResponse {
    pub resource_type: String,
    pub resource_id: String,
    pub holders: Vec<Holder>,
}

#[derive(Serialize)]
pub struct LockedResourcesResponse {
    pub resource_type: String,
    pub resource_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct ExpiryResponse {
    pub user_id: String,
    pub expires_at: Timestamp,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub default_ttl_secs: u64,
    pub version: String,
}
