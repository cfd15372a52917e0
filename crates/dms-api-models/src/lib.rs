#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
//! Shared HTTP DTOs for the DMS backend API.
//!
//! The console and the CLI encode requests and decode responses through these
//! types only, so the wire contract with the backend lives in one place.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role string carried by administrator accounts.
pub const ROLE_ADMIN: &str = "admin";

/// Timestamp as emitted by the backend.
///
/// The backend serialises naive UTC datetimes without a zone suffix, so the raw
/// string is kept and interpreted on demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct ServerTimestamp(pub String);

impl ServerTimestamp {
    /// Raw value as received.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Interpret the value as UTC. Values without an explicit offset are
    /// treated as UTC; unparseable values yield `None`.
    #[must_use]
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.0.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| naive.and_utc())
    }
}

impl From<&str> for ServerTimestamp {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Token issued by `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    /// Opaque bearer token.
    pub access_token: String,
    /// Token scheme, normally `bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Compact user reference embedded in documents and audit entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserBasic {
    /// User identifier.
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
}

/// Full user account as returned by the users endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// User identifier.
    pub id: i64,
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Role name (`admin` or `user`).
    pub role: String,
    /// Whether the account may log in.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Account creation time.
    #[serde(default)]
    pub created_at: ServerTimestamp,
}

impl User {
    /// Whether the account carries the administrator role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

const fn default_true() -> bool {
    true
}

/// Payload for `POST /api/auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserCreateRequest {
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Initial password.
    pub password: String,
    /// Role name.
    pub role: String,
}

/// Partial update for `PUT /api/users/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UserUpdateRequest {
    /// New contact address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Activation flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    /// New role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Payload for `PUT /api/users/me/password`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PasswordChangeRequest {
    /// Password currently in use.
    pub current_password: String,
    /// Replacement password.
    pub new_password: String,
}

/// Generic `{ "message": ... }` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    /// Human-readable message.
    pub message: String,
}

/// Generated document record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    /// Document identifier.
    pub id: i64,
    /// Sequential document number assigned by the backend.
    pub document_number: String,
    /// Document title.
    pub title: String,
    /// Template used to render the PDF.
    #[serde(default)]
    pub template_id: Option<i64>,
    /// Identifier of the requesting user.
    #[serde(default)]
    pub requested_by_id: Option<i64>,
    /// Creation time.
    pub created_at: ServerTimestamp,
    /// Stored PDF file name.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Requesting user, when expanded by the backend.
    #[serde(default)]
    pub requested_by: Option<UserBasic>,
    /// Template display name, when expanded by the backend.
    #[serde(default)]
    pub template_name: Option<String>,
}

impl Document {
    /// Username of the requester, or `Unknown` when not expanded.
    #[must_use]
    pub fn creator_label(&self) -> &str {
        self.requested_by
            .as_ref()
            .map_or("Unknown", |user| user.username.as_str())
    }
}

/// Payload for `POST /api/documents/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentCreateRequest {
    /// Document title.
    pub title: String,
    /// Template to render with.
    pub template_id: i64,
    /// HTML body.
    pub content: String,
}

/// PDF template record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Template {
    /// Template identifier.
    pub id: i64,
    /// Unique template name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Stored file name.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Creation time.
    pub created_at: ServerTimestamp,
    /// Last update time.
    #[serde(default)]
    pub updated_at: Option<ServerTimestamp>,
}

/// Audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditLogEntry {
    /// Entry identifier.
    pub id: i64,
    /// Acting user identifier.
    pub user_id: i64,
    /// Action code, e.g. `USER_LOGIN`.
    pub action: String,
    /// Related document, if any.
    #[serde(default)]
    pub document_id: Option<i64>,
    /// Time of the action.
    pub timestamp: ServerTimestamp,
    /// Free-form details.
    #[serde(default)]
    pub details: Option<String>,
    /// Acting user, when expanded by the backend.
    #[serde(default)]
    pub user: Option<UserBasic>,
}

/// Backup archive listed by `GET /api/admin/backup/list`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupFile {
    /// Archive file name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification time, preformatted by the backend.
    pub date: String,
}

/// Envelope for the backup listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct BackupListResponse {
    /// Archives, newest first.
    #[serde(default)]
    pub backups: Vec<BackupFile>,
}

/// Response to `POST /api/admin/backup/create`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupCreateResponse {
    /// Created archive name.
    pub backup_file: String,
    /// Server-side path.
    #[serde(default)]
    pub path: Option<String>,
    /// Archive size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Backend timestamp label.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Payload for `POST /api/admin/backup/restore`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupRestoreRequest {
    /// Archive to restore.
    pub backup_file: String,
}

/// Which data set a sync run covers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    /// Generated documents.
    Documents,
    /// Application logs.
    Logs,
    /// Documents and logs.
    #[default]
    All,
}

impl SyncType {
    /// Wire name of the sync type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Logs => "logs",
            Self::All => "all",
        }
    }
}

/// Default remote directory for sync targets.
pub const DEFAULT_SYNC_PATH: &str = "/DMS";
/// Default SMB port.
pub const DEFAULT_SMB_PORT: u16 = 445;

fn default_sync_path() -> String {
    DEFAULT_SYNC_PATH.to_string()
}

const fn default_smb_port() -> u16 {
    DEFAULT_SMB_PORT
}

/// SMB/NAS connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmbConfig {
    /// Server host name or address.
    pub host: String,
    /// Server port.
    #[serde(default = "default_smb_port")]
    pub port: u16,
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
    /// Share name.
    pub share: String,
    /// Directory within the share.
    #[serde(default = "default_sync_path")]
    pub path: String,
}

/// Nextcloud connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NextcloudConfig {
    /// Server base URL.
    pub url: String,
    /// Account name.
    pub username: String,
    /// App password.
    pub password: String,
    /// Directory within the account.
    #[serde(default = "default_sync_path")]
    pub path: String,
}

/// Sync selector shared by every backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncRequest {
    /// Data set to sync.
    pub sync_type: SyncType,
    /// Target directory, local sync only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Body for `POST /api/admin/sync/smb` and `/nextcloud`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteSyncRequest<C> {
    /// Backend connection settings.
    pub config: C,
    /// Sync selector.
    pub request: SyncRequest,
}

/// Body for `POST /api/admin/sync/local`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalSyncRequest {
    /// Sync selector including the target directory.
    pub request: SyncRequest,
}

/// Response to a sync run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SyncResponse {
    /// Whether the run succeeded.
    #[serde(default)]
    pub success: bool,
    /// Summary message; string or structured.
    #[serde(default)]
    pub message: Option<Value>,
    /// Per-data-set results keyed by sync type.
    #[serde(default)]
    pub results: Map<String, Value>,
}

/// Response to a connection test.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConnectionTestResponse {
    /// Whether the connection succeeded.
    #[serde(default)]
    pub success: bool,
    /// Failure or status message.
    #[serde(default)]
    pub message: Option<String>,
    /// SMB share reached.
    #[serde(default)]
    pub share: Option<String>,
    /// Nextcloud URL reached.
    #[serde(default)]
    pub url: Option<String>,
    /// Nextcloud account used.
    #[serde(default)]
    pub username: Option<String>,
}

/// Response to `GET /api/admin/sync/status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SyncStatus {
    /// Whether SMB sync is configured server-side.
    #[serde(default)]
    pub smb_enabled: bool,
    /// Configured SMB host.
    #[serde(default)]
    pub smb_host: Option<String>,
    /// Configured SMB share.
    #[serde(default)]
    pub smb_share: Option<String>,
    /// Storage root.
    #[serde(default)]
    pub storage_dir: Option<String>,
    /// Backup directory.
    #[serde(default)]
    pub backup_dir: Option<String>,
    /// Upload directory.
    #[serde(default)]
    pub uploads_dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn naive_timestamps_are_read_as_utc() {
        let stamp = ServerTimestamp::from("2024-03-01T10:15:30.123456");
        let parsed = stamp.to_utc().expect("naive timestamp parses");
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T10:15:30.123456+00:00");
    }

    #[test]
    fn zoned_timestamps_keep_their_offset() {
        let stamp = ServerTimestamp::from("2024-03-01T10:15:30+05:30");
        let parsed = stamp.to_utc().expect("zoned timestamp parses");
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T04:45:30+00:00");
    }

    #[test]
    fn garbage_timestamps_are_rejected() {
        assert!(ServerTimestamp::from("yesterday").to_utc().is_none());
        assert!(ServerTimestamp::default().to_utc().is_none());
    }

    #[test]
    fn user_update_omits_unset_fields() {
        let update = UserUpdateRequest {
            is_active: Some(false),
            ..UserUpdateRequest::default()
        };
        let value = serde_json::to_value(&update).expect("serialise");
        assert_eq!(value, json!({"is_active": false}));
    }

    #[test]
    fn smb_config_fills_defaults() {
        let config: SmbConfig = serde_json::from_value(json!({
            "host": "nas.local",
            "username": "backup",
            "password": "secret",
            "share": "archive"
        }))
        .expect("deserialise");
        assert_eq!(config.port, DEFAULT_SMB_PORT);
        assert_eq!(config.path, DEFAULT_SYNC_PATH);
    }

    #[test]
    fn sync_results_preserve_backend_order() {
        let response: SyncResponse = serde_json::from_value(json!({
            "success": true,
            "message": "Sync completed",
            "results": {"logs": [], "documents": {"message": "3 files"}}
        }))
        .expect("deserialise");
        let keys: Vec<_> = response.results.keys().cloned().collect();
        assert_eq!(keys, vec!["logs".to_string(), "documents".to_string()]);
    }

    #[test]
    fn document_creator_falls_back_to_unknown() {
        let document: Document = serde_json::from_value(json!({
            "id": 1,
            "document_number": "DOC-0001",
            "title": "Quote",
            "created_at": "2024-01-01T00:00:00"
        }))
        .expect("deserialise");
        assert_eq!(document.creator_label(), "Unknown");
    }

    #[test]
    fn user_role_gates_admin() {
        let user: User = serde_json::from_value(json!({
            "id": 7,
            "username": "root",
            "email": "root@example.com",
            "role": "admin"
        }))
        .expect("deserialise");
        assert!(user.is_admin());
        assert!(user.is_active);
    }
}
