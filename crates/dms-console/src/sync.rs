//! Remote sync client for SMB, Nextcloud and local targets.
//!
//! Every call is a stateless pass-through: inputs are validated locally, one
//! request is issued, and the response is summarised into a report.

use dms_api_models::{
    ConnectionTestResponse, LocalSyncRequest, NextcloudConfig, RemoteSyncRequest, SmbConfig,
    SyncRequest, SyncResponse, SyncType,
};
use serde_json::Value;
use url::Url;

use crate::client::{ApiClient, ApiRequest, is_truthy};
use crate::error::{ConsoleError, ConsoleResult};

/// Precondition message for a missing local target.
pub const MISSING_TARGET_MESSAGE: &str = "Please enter a target directory path";

/// Outcome of a connection test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    /// Whether the backend reached the target.
    pub connected: bool,
    /// Operator-facing summary.
    pub message: String,
}

/// Outcome of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Whether the backend reported success.
    pub success: bool,
    /// Headline, e.g. `Nextcloud sync completed` or `Sync failed: ...`.
    pub headline: String,
    /// Per-type detail for successful runs.
    pub detail: Option<String>,
}

/// Sync calls bound to one API client and token.
#[derive(Debug, Clone, Copy)]
pub struct SyncClient<'a> {
    api: &'a ApiClient,
    token: Option<&'a str>,
}

impl<'a> SyncClient<'a> {
    /// Bind the sync calls to `api` and `token`.
    #[must_use]
    pub const fn new(api: &'a ApiClient, token: Option<&'a str>) -> Self {
        Self { api, token }
    }

    /// `POST /api/admin/sync/test-smb`.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings or API errors.
    pub async fn test_smb(&self, config: &SmbConfig) -> ConsoleResult<ConnectionReport> {
        validate_smb(config)?;
        let response: ConnectionTestResponse = self
            .api
            .call_json(
                self.token,
                ApiRequest::post("/admin/sync/test-smb").json(config)?,
            )
            .await?;
        let share = response.share.clone().unwrap_or_else(|| config.share.clone());
        Ok(connection_report(&response, || format!("Connected to {share}")))
    }

    /// `POST /api/admin/sync/smb`.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings or API errors.
    pub async fn sync_smb(
        &self,
        config: &SmbConfig,
        sync_type: SyncType,
    ) -> ConsoleResult<SyncReport> {
        validate_smb(config)?;
        let body = RemoteSyncRequest {
            config: config.clone(),
            request: SyncRequest {
                sync_type,
                target: None,
            },
        };
        let response = self.run("/admin/sync/smb", &body).await?;
        tracing::info!(sync_type = sync_type.as_str(), success = response.success, "smb sync finished");
        Ok(sync_report(&response, sync_type, "Sync completed"))
    }

    /// `POST /api/admin/sync/test-nextcloud`.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings or API errors.
    pub async fn test_nextcloud(&self, config: &NextcloudConfig) -> ConsoleResult<ConnectionReport> {
        validate_nextcloud(config)?;
        let response: ConnectionTestResponse = self
            .api
            .call_json(
                self.token,
                ApiRequest::post("/admin/sync/test-nextcloud").json(config)?,
            )
            .await?;
        let user = response
            .username
            .clone()
            .unwrap_or_else(|| config.username.clone());
        let url = response.url.clone().unwrap_or_else(|| config.url.clone());
        Ok(connection_report(&response, || {
            format!("Connected to Nextcloud: {user}@{url}")
        }))
    }

    /// `POST /api/admin/sync/nextcloud`.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings or API errors.
    pub async fn sync_nextcloud(
        &self,
        config: &NextcloudConfig,
        sync_type: SyncType,
    ) -> ConsoleResult<SyncReport> {
        validate_nextcloud(config)?;
        let body = RemoteSyncRequest {
            config: config.clone(),
            request: SyncRequest {
                sync_type,
                target: None,
            },
        };
        let response = self.run("/admin/sync/nextcloud", &body).await?;
        tracing::info!(sync_type = sync_type.as_str(), success = response.success, "nextcloud sync finished");
        Ok(sync_report(&response, sync_type, "Nextcloud sync completed"))
    }

    /// `POST /api/admin/sync/local`.
    ///
    /// # Errors
    ///
    /// Fails without a request when `target` is blank or escapes upwards.
    pub async fn sync_local(&self, target: &str, sync_type: SyncType) -> ConsoleResult<SyncReport> {
        let target = target.trim();
        if target.is_empty() {
            return Err(ConsoleError::precondition(MISSING_TARGET_MESSAGE));
        }
        validate_path("Target directory", target)?;
        let body = LocalSyncRequest {
            request: SyncRequest {
                sync_type,
                target: Some(target.to_string()),
            },
        };
        let response = self.run("/admin/sync/local", &body).await?;
        tracing::info!(sync_type = sync_type.as_str(), success = response.success, "local sync finished");
        Ok(sync_report(&response, sync_type, "Local sync completed"))
    }

    async fn run<B: serde::Serialize>(&self, endpoint: &str, body: &B) -> ConsoleResult<SyncResponse> {
        let request = ApiRequest::post(endpoint).json(body)?;
        Ok(self.api.call_json(self.token, request).await?)
    }
}

fn connection_report(
    response: &ConnectionTestResponse,
    connected: impl FnOnce() -> String,
) -> ConnectionReport {
    if response.success {
        return ConnectionReport {
            connected: true,
            message: connected(),
        };
    }
    let reason = response.message.as_deref().unwrap_or("unknown error");
    ConnectionReport {
        connected: false,
        message: format!("Connection failed: {reason}"),
    }
}

/// Summarise a sync response for `sync_type`.
#[must_use]
pub fn sync_report(response: &SyncResponse, sync_type: SyncType, completed: &str) -> SyncReport {
    if !response.success {
        let message = match &response.message {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => Value::Null.to_string(),
        };
        return SyncReport {
            success: false,
            headline: format!("Sync failed: {message}"),
            detail: None,
        };
    }
    SyncReport {
        success: true,
        headline: completed.to_string(),
        detail: Some(result_message(response, sync_type)),
    }
}

/// Pick the human-readable message for `sync_type` out of `results`.
///
/// For [`SyncType::All`] the first entry is used. The entry's `message` is
/// preferred; otherwise the entry itself is serialised.
#[must_use]
pub fn result_message(response: &SyncResponse, sync_type: SyncType) -> String {
    let details = match sync_type {
        SyncType::All => response.results.values().next(),
        other => response.results.get(other.as_str()),
    };
    match details {
        Some(details) => match details.get("message") {
            Some(Value::String(message)) if !message.is_empty() => message.clone(),
            Some(message) if is_truthy(message) => message.to_string(),
            _ => details.to_string(),
        },
        None => Value::Object(response.results.clone()).to_string(),
    }
}

fn require(field: &str, value: &str) -> ConsoleResult<()> {
    if value.trim().is_empty() {
        return Err(ConsoleError::precondition(format!("{field} is required")));
    }
    Ok(())
}

/// Reject paths that climb out of their root.
///
/// # Errors
///
/// Returns a precondition failure naming `field`.
pub fn validate_path(field: &str, path: &str) -> ConsoleResult<()> {
    let normalized = path.replace('\\', "/");
    let escapes = normalized == ".."
        || normalized.starts_with("../")
        || normalized.contains("/../")
        || normalized.ends_with("/..");
    if escapes {
        return Err(ConsoleError::precondition(format!(
            "{field} must not contain '..'"
        )));
    }
    Ok(())
}

/// Check SMB settings before they are sent.
///
/// # Errors
///
/// Returns the first failing precondition.
pub fn validate_smb(config: &SmbConfig) -> ConsoleResult<()> {
    require("SMB host", &config.host)?;
    require("SMB username", &config.username)?;
    require("SMB password", &config.password)?;
    require("SMB share", &config.share)?;
    if config.port == 0 {
        return Err(ConsoleError::precondition("SMB port must be between 1 and 65535"));
    }
    validate_path("SMB path", &config.path)
}

/// Check Nextcloud settings before they are sent.
///
/// # Errors
///
/// Returns the first failing precondition.
pub fn validate_nextcloud(config: &NextcloudConfig) -> ConsoleResult<()> {
    require("Nextcloud URL", &config.url)?;
    require("Nextcloud username", &config.username)?;
    require("Nextcloud password", &config.password)?;
    let scheme_ok = Url::parse(config.url.trim())
        .is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host());
    if !scheme_ok {
        return Err(ConsoleError::precondition(
            "Nextcloud URL must start with http:// or https://",
        ));
    }
    validate_path("Nextcloud path", &config.path)
}
