//! Input forms and their local validation.
//!
//! Each form turns raw operator input into a request body, or fails with the
//! message the operator sees. No form touches the network.

use std::path::PathBuf;

use dms_api_models::{DocumentCreateRequest, PasswordChangeRequest, ROLE_ADMIN, UserCreateRequest};

use crate::error::{ConsoleError, ConsoleResult};

/// Shown when the new password and its confirmation differ.
pub const PASSWORD_MISMATCH_MESSAGE: &str = "New passwords do not match";
/// Shown when no template was chosen for a new document.
pub const SELECT_TEMPLATE_MESSAGE: &str = "Please select a template";
/// Shown when a new document has no body.
pub const EMPTY_CONTENT_MESSAGE: &str = "Please enter document content";
/// Shown when a template upload has no file.
pub const SELECT_FILE_MESSAGE: &str = "Please select a file";

/// Role of a regular account.
pub const ROLE_USER: &str = "user";

fn require(value: &str, message: &str) -> ConsoleResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConsoleError::precondition(message));
    }
    Ok(trimmed.to_string())
}

/// Password change dialog.
#[derive(Debug, Clone, Default)]
pub struct PasswordChangeForm {
    /// Current password.
    pub current: String,
    /// Desired password.
    pub new: String,
    /// Desired password, repeated.
    pub confirm: String,
}

impl PasswordChangeForm {
    /// Validate and build the request body.
    ///
    /// # Errors
    ///
    /// Fails with [`PASSWORD_MISMATCH_MESSAGE`] or a missing-field message.
    pub fn validate(&self) -> ConsoleResult<PasswordChangeRequest> {
        if self.new != self.confirm {
            return Err(ConsoleError::precondition(PASSWORD_MISMATCH_MESSAGE));
        }
        if self.current.is_empty() {
            return Err(ConsoleError::precondition("Please enter your current password"));
        }
        if self.new.is_empty() {
            return Err(ConsoleError::precondition("Please enter a new password"));
        }
        Ok(PasswordChangeRequest {
            current_password: self.current.clone(),
            new_password: self.new.clone(),
        })
    }
}

/// New document form.
#[derive(Debug, Clone, Default)]
pub struct NewDocumentForm {
    /// Document title.
    pub title: String,
    /// Chosen template.
    pub template_id: Option<i64>,
    /// Document body (HTML or plain text).
    pub content: String,
}

impl NewDocumentForm {
    /// Validate and build the request body.
    ///
    /// # Errors
    ///
    /// Fails when the title, template or content is missing.
    pub fn validate(&self) -> ConsoleResult<DocumentCreateRequest> {
        let title = require(&self.title, "Please enter a document title")?;
        let template_id = self
            .template_id
            .ok_or_else(|| ConsoleError::precondition(SELECT_TEMPLATE_MESSAGE))?;
        if self.content.trim().is_empty() {
            return Err(ConsoleError::precondition(EMPTY_CONTENT_MESSAGE));
        }
        Ok(DocumentCreateRequest {
            title,
            template_id,
            content: self.content.clone(),
        })
    }
}

/// Template upload form.
#[derive(Debug, Clone, Default)]
pub struct TemplateUploadForm {
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: String,
    /// PDF to upload.
    pub file: Option<PathBuf>,
}

/// Validated template upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateUpload {
    /// Display name.
    pub name: String,
    /// Description, possibly empty.
    pub description: String,
    /// PDF to upload.
    pub file: PathBuf,
}

impl TemplateUploadForm {
    /// Validate the form.
    ///
    /// # Errors
    ///
    /// Fails when the name or file is missing.
    pub fn validate(&self) -> ConsoleResult<TemplateUpload> {
        let name = require(&self.name, "Please enter a template name")?;
        let file = self
            .file
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
            .ok_or_else(|| ConsoleError::precondition(SELECT_FILE_MESSAGE))?;
        Ok(TemplateUpload {
            name,
            description: self.description.trim().to_string(),
            file,
        })
    }
}

/// New user form.
#[derive(Debug, Clone)]
pub struct NewUserForm {
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Initial password.
    pub password: String,
    /// `admin` or `user`.
    pub role: String,
}

impl Default for NewUserForm {
    fn default() -> Self {
        Self {
            username: String::new(),
            email: String::new(),
            password: String::new(),
            role: ROLE_USER.to_string(),
        }
    }
}

impl NewUserForm {
    /// Validate and build the request body.
    ///
    /// # Errors
    ///
    /// Fails on missing fields, a malformed email or an unknown role.
    pub fn validate(&self) -> ConsoleResult<UserCreateRequest> {
        let username = require(&self.username, "Please enter a username")?;
        let email = require(&self.email, "Please enter an email address")?;
        if !email.contains('@') {
            return Err(ConsoleError::precondition("Please enter a valid email address"));
        }
        if self.password.is_empty() {
            return Err(ConsoleError::precondition("Please enter a password"));
        }
        let role = self.role.trim().to_ascii_lowercase();
        if role != ROLE_ADMIN && role != ROLE_USER {
            return Err(ConsoleError::precondition(format!(
                "Role must be '{ROLE_ADMIN}' or '{ROLE_USER}'"
            )));
        }
        Ok(UserCreateRequest {
            username,
            email,
            password: self.password.clone(),
            role,
        })
    }
}
