//! Session state and token persistence.
//!
//! The token survives restarts through a [`TokenStore`]; the current user is
//! only ever held in memory and re-fetched on startup.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dms_api_models::User;
use serde_json::{Map, Value};

use crate::error::StoreError;

/// Key the token is stored under inside the session file.
pub const TOKEN_KEY: &str = "token";

/// Authentication state of the console.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Bearer token, when logged in.
    pub token: Option<String>,
    /// Profile of the logged-in user, once fetched.
    pub current_user: Option<User>,
}

impl Session {
    /// Whether the session carries a token.
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Whether the current user is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.current_user.as_ref().is_some_and(User::is_admin)
    }

    /// Forget token and user.
    pub fn clear(&mut self) {
        self.token = None;
        self.current_user = None;
    }
}

/// Durable storage for the bearer token.
pub trait TokenStore: Send + Sync {
    /// Read the persisted token, if any.
    ///
    /// # Errors
    ///
    /// Fails when the backing storage cannot be read.
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// Persist `token`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Fails when the backing storage cannot be written.
    fn save(&mut self, token: &str) -> Result<(), StoreError>;

    /// Remove the persisted token.
    ///
    /// # Errors
    ///
    /// Fails when the backing storage cannot be written.
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// Token store backed by a small JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store the token at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&raw).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Like `read_document`, but a corrupt file is replaced on the next write.
    fn read_document_or_reset(&self) -> Result<Map<String, Value>, StoreError> {
        match self.read_document() {
            Ok(document) => Ok(document),
            Err(StoreError::Json { .. }) => Ok(Map::new()),
            Err(err) => Err(err),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let rendered = serde_json::to_string_pretty(document).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, rendered).map_err(io_error)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        let document = self.read_document()?;
        Ok(document
            .get(TOKEN_KEY)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string))
    }

    fn save(&mut self, token: &str) -> Result<(), StoreError> {
        let mut document = self.read_document_or_reset()?;
        document.insert(TOKEN_KEY.to_string(), Value::String(token.to_string()));
        self.write_document(&document)
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        let mut document = self.read_document_or_reset()?;
        if document.remove(TOKEN_KEY).is_none() && !self.path.exists() {
            return Ok(());
        }
        self.write_document(&document)
    }
}

/// In-memory token store, shareable between handles.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    token: Arc<Mutex<Option<String>>>,
}

impl MemoryTokenStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Arc::new(Mutex::new(Some(token.into()))),
        }
    }

    /// Current token, for inspection.
    #[must_use]
    pub fn snapshot(&self) -> Option<String> {
        self.token.lock().ok().and_then(|guard| guard.clone())
    }

    fn set(&self, token: Option<String>) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = token;
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.snapshot())
    }

    fn save(&mut self, token: &str) -> Result<(), StoreError> {
        self.set(Some(token.to_string()));
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.set(None);
        Ok(())
    }
}
