//! Console composition root.
//!
//! # Design
//! - [`Console`] owns the API client, token store, session and view state;
//!   every state change goes through one of its methods.
//! - Any 401, from any call, expires the session: token and user are
//!   dropped from memory and storage and the login view is forced.
//! - Loads are split into [`Console::fetch`] (network only) and
//!   [`Console::apply`] (state only) so overlapping requests can be resolved
//!   by ticket; [`Console::load`] composes both for sequential callers.
//! - Destructive actions ask a [`Confirm`] implementation before any request.

use std::path::Path;

use dms_api_models::{
    BackupCreateResponse, BackupRestoreRequest, Document, MessageResponse, NextcloudConfig,
    SmbConfig, SyncStatus, SyncType, Template, TokenResponse, User, UserUpdateRequest,
};
use reqwest::multipart::{Form, Part};

use crate::client::{ApiBody, ApiClient, ApiRequest};
use crate::error::{ApiError, ApiResult, ConsoleError, ConsoleResult, StoreError};
use crate::forms::{NewDocumentForm, NewUserForm, PasswordChangeForm, TemplateUploadForm};
use crate::loaders::{self, TabView};
use crate::session::{Session, TokenStore};
use crate::sync::{ConnectionReport, SyncClient, SyncReport};
use crate::view::{DocumentFilters, LoadTicket, Mode, Tab, ViewState};

/// Shown after a successful password change.
pub const PASSWORD_CHANGED_MESSAGE: &str = "Password changed successfully!";
/// Shown after a successful template upload.
pub const TEMPLATE_UPLOADED_MESSAGE: &str = "Template uploaded successfully!";
/// Shown after a successful user registration.
pub const USER_CREATED_MESSAGE: &str = "User created successfully!";
/// Fallback shown after a successful restore.
pub const RESTORE_SUCCESS_MESSAGE: &str = "Restore successful";

const PDF_MIME: &str = "application/pdf";
const ZIP_MIME: &str = "application/zip";

/// Asks the operator to approve a destructive action.
pub trait Confirm: Send {
    /// Return `true` to proceed.
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool + Send,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Prompt shown before deleting a template.
pub const DELETE_TEMPLATE_PROMPT: &str = "Are you sure you want to delete this template?";
/// Prompt shown before deleting a user.
pub const DELETE_USER_PROMPT: &str = "Are you sure you want to delete this user?";

/// Prompt shown before restoring `name`.
#[must_use]
pub fn restore_prompt(name: &str) -> String {
    format!("Restore from {name}? This will overwrite current data.")
}

/// `Document <number> created successfully!`
#[must_use]
pub fn document_created_message(document: &Document) -> String {
    format!("Document {} created successfully!", document.document_number)
}

/// `Backup created: <file>`
#[must_use]
pub fn backup_created_message(backup: &BackupCreateResponse) -> String {
    format!("Backup created: {}", backup.backup_file)
}

/// File name used when a document download has no explicit destination.
#[must_use]
pub fn default_document_file_name(id: i64) -> String {
    format!("document_{id}.pdf")
}

/// Network half of a load, ready to be applied.
#[derive(Debug)]
pub struct FetchOutcome {
    ticket: LoadTicket,
    result: ApiResult<TabView>,
}

impl FetchOutcome {
    /// Ticket the fetch was issued with.
    #[must_use]
    pub const fn ticket(&self) -> &LoadTicket {
        &self.ticket
    }
}

/// Result of applying a fetched load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadResult {
    /// The view is current and should be rendered.
    Applied(TabView),
    /// A newer request superseded this one.
    Discarded,
    /// The backend rejected the session; the login view is active.
    LoggedOut,
}

/// Successful mutation plus the refreshed list it affected, when that list
/// is on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation<T> {
    /// Value returned by the backend.
    pub value: T,
    /// Re-fetched view of the affected tab.
    pub refreshed: Option<LoadResult>,
}

/// Selectable entry for template or user pickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Choice {
    /// Entity id.
    pub id: i64,
    /// Display label.
    pub label: String,
}

/// The console state machine.
pub struct Console {
    api: ApiClient,
    store: Box<dyn TokenStore>,
    session: Session,
    view: ViewState,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("api", &self.api)
            .field("logged_in", &self.session.has_token())
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

impl Console {
    /// Build a console, picking up any token persisted in `store`. A corrupt
    /// store is reset and the console starts logged out.
    ///
    /// # Errors
    ///
    /// Fails when the store cannot be read or reset.
    pub fn new(api: ApiClient, mut store: Box<dyn TokenStore>) -> ConsoleResult<Self> {
        let token = match store.load() {
            Ok(token) => token,
            Err(StoreError::Json { path, source }) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "discarding corrupt session file"
                );
                store.clear()?;
                None
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            api,
            store,
            session: Session {
                token,
                current_user: None,
            },
            view: ViewState::new(),
        })
    }

    /// Underlying API client.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Current session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Current view state.
    #[must_use]
    pub const fn view(&self) -> &ViewState {
        &self.view
    }

    /// Logged-in user, when known.
    #[must_use]
    pub const fn current_user(&self) -> Option<&User> {
        self.session.current_user.as_ref()
    }

    /// Resume a persisted session.
    ///
    /// Without a token the login view is shown. With one, the current user is
    /// fetched: success enters the app, failure falls back to the login view.
    ///
    /// # Errors
    ///
    /// Returns the failure that prevented resuming; a 401 has already
    /// cleared the stored token by then.
    pub async fn initialize(&mut self) -> ConsoleResult<Mode> {
        let Some(token) = self.session.token.clone() else {
            self.view.show_login();
            return Ok(Mode::Login);
        };
        let me = self.fetch_me(&token).await;
        match self.settle(me) {
            Ok(user) => {
                tracing::debug!(username = %user.username, "resumed session");
                self.session.current_user = Some(user);
                self.view.enter_app();
                Ok(Mode::App)
            }
            Err(err) => {
                self.session.current_user = None;
                self.view.show_login();
                Err(err)
            }
        }
    }

    /// Authenticate and enter the app with the documents tab loaded.
    ///
    /// The token is stored before the profile is fetched. A profile failure
    /// other than a 401 is logged and the app is entered without a profile.
    ///
    /// # Errors
    ///
    /// Fails on blank input, rejected credentials, a token that cannot be
    /// stored, or a 401 on the profile fetch; the login view is active in
    /// every case.
    pub async fn login(&mut self, username: &str, password: &str) -> ConsoleResult<LoadResult> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(ConsoleError::precondition(
                "Please enter username and password",
            ));
        }
        let TokenResponse { access_token, .. } = self.api.login(username.trim(), password).await?;
        self.store.save(&access_token)?;
        self.session = Session {
            token: Some(access_token.clone()),
            current_user: None,
        };
        tracing::info!(username = username.trim(), "logged in");

        let me = self.fetch_me(&access_token).await;
        match self.settle(me) {
            Ok(user) => self.session.current_user = Some(user),
            Err(err) if err.is_unauthorized() => return Err(err),
            Err(err) => tracing::warn!(error = %err, "failed to load the current user"),
        }
        let ticket = self.view.enter_app();
        Ok(self.load(ticket).await)
    }

    /// Drop the session and show the login view.
    ///
    /// # Errors
    ///
    /// Fails when the stored token cannot be removed; memory state is
    /// cleared regardless.
    pub fn logout(&mut self) -> ConsoleResult<()> {
        self.session.clear();
        self.view.show_login();
        tracing::info!("logged out");
        self.store.clear()?;
        Ok(())
    }

    /// Change the logged-in user's password.
    ///
    /// # Errors
    ///
    /// Fails locally on invalid input, otherwise with the API error.
    pub async fn change_password(&mut self, form: &PasswordChangeForm) -> ConsoleResult<String> {
        let body = form.validate()?;
        let token = self.require_session()?;
        let request = ApiRequest::put("/users/me/password").json(&body)?;
        let result = self.api.call(Some(&token), request).await;
        self.settle(result)?;
        tracing::info!("password changed");
        Ok(PASSWORD_CHANGED_MESSAGE.to_string())
    }

    /// Activate `tab` and return the ticket of its load.
    ///
    /// # Errors
    ///
    /// Fails without a session, or with [`ConsoleError::AdminRequired`] for
    /// admin tabs when the user is not an administrator.
    pub fn select_tab(&mut self, tab: Tab) -> ConsoleResult<LoadTicket> {
        self.require_session()?;
        if tab.requires_admin() {
            self.require_admin()?;
        }
        Ok(self.view.select(tab))
    }

    /// Reissue the load for the active tab.
    ///
    /// # Errors
    ///
    /// Fails without a session.
    pub fn refresh(&mut self) -> ConsoleResult<LoadTicket> {
        self.require_session()?;
        Ok(self.view.refresh())
    }

    /// Advance the active tab by one page.
    ///
    /// # Errors
    ///
    /// Fails when the last load did not report a further page.
    pub fn next_page(&mut self) -> ConsoleResult<LoadTicket> {
        self.require_session()?;
        let state = self.view.tab(self.view.active());
        if !state.has_next {
            return Err(ConsoleError::precondition("No next page"));
        }
        Ok(self.view.set_page(state.page.saturating_add(1)))
    }

    /// Step the active tab back one page.
    ///
    /// # Errors
    ///
    /// Fails on page 0.
    pub fn previous_page(&mut self) -> ConsoleResult<LoadTicket> {
        self.require_session()?;
        let state = self.view.tab(self.view.active());
        if state.page == 0 {
            return Err(ConsoleError::precondition("Already on the first page"));
        }
        Ok(self.view.set_page(state.page - 1))
    }

    /// Jump the active tab straight to zero-based `page`.
    ///
    /// # Errors
    ///
    /// Fails without a session.
    pub fn go_to_page(&mut self, page: u32) -> ConsoleResult<LoadTicket> {
        self.require_session()?;
        Ok(self.view.set_page(page))
    }

    /// Filter the documents list and return to page 0.
    ///
    /// # Errors
    ///
    /// Fails without a session; filtering by creator is reserved for
    /// administrators.
    pub fn filter_documents(&mut self, filters: DocumentFilters) -> ConsoleResult<LoadTicket> {
        self.require_session()?;
        if filters.created_by.is_some() {
            self.require_admin()?;
        }
        Ok(self.view.set_document_filters(filters))
    }

    /// Search documents by title; a blank query reloads the plain list.
    ///
    /// # Errors
    ///
    /// Fails without a session.
    pub fn search_documents(&mut self, query: &str) -> ConsoleResult<LoadTicket> {
        self.require_session()?;
        Ok(self.view.set_search(query))
    }

    /// Scope the audit tab to one user, or to everyone.
    ///
    /// # Errors
    ///
    /// Fails unless an administrator is logged in.
    pub fn scope_audit(&mut self, user_id: Option<i64>) -> ConsoleResult<LoadTicket> {
        self.require_session()?;
        self.require_admin()?;
        Ok(self.view.set_audit_user(user_id))
    }

    /// Run the network half of a load. Takes `&self` so several fetches may
    /// be in flight at once.
    pub async fn fetch(&self, ticket: LoadTicket) -> FetchOutcome {
        let token = self.session.token.as_deref();
        let result = loaders::load_tab(&self.api, token, ticket.tab, &ticket.query).await;
        FetchOutcome { ticket, result }
    }

    /// Apply a fetched load. Unauthorized responses log out even when stale;
    /// otherwise responses for superseded tickets are dropped.
    pub fn apply(&mut self, outcome: FetchOutcome) -> LoadResult {
        let FetchOutcome { ticket, result } = outcome;
        if matches!(result, Err(ApiError::Unauthorized)) {
            self.expire_session();
            return LoadResult::LoggedOut;
        }
        if !self.view.is_current(&ticket) {
            tracing::debug!(tab = %ticket.tab, epoch = ticket.epoch, "discarding stale response");
            return LoadResult::Discarded;
        }
        let view = result.unwrap_or_else(|err| TabView::failed(ticket.tab, &ticket.query, &err));
        let has_next = view.pagination().is_some_and(|pagination| pagination.has_next);
        self.view.record_has_next(ticket.tab, has_next);
        LoadResult::Applied(view)
    }

    /// Fetch and apply in one step.
    pub async fn load(&mut self, ticket: LoadTicket) -> LoadResult {
        let outcome = self.fetch(ticket).await;
        self.apply(outcome)
    }

    /// Create a document from `form`.
    ///
    /// # Errors
    ///
    /// Fails locally on invalid input, otherwise with the API error.
    pub async fn create_document(
        &mut self,
        form: &NewDocumentForm,
    ) -> ConsoleResult<Mutation<Document>> {
        let body = form.validate()?;
        let token = self.require_session()?;
        let request = ApiRequest::post("/documents/").json(&body)?;
        let result = self.api.call_json::<Document>(Some(&token), request).await;
        let document = self.settle(result)?;
        tracing::info!(document_number = %document.document_number, "document created");
        let refreshed = self.refresh_if_active(Tab::Documents).await;
        Ok(Mutation {
            value: document,
            refreshed,
        })
    }

    /// Fetch one document.
    ///
    /// # Errors
    ///
    /// Fails with the API error.
    pub async fn document(&mut self, id: i64) -> ConsoleResult<Document> {
        let token = self.require_session()?;
        let result = self
            .api
            .call_json(Some(&token), ApiRequest::get(format!("/documents/{id}")))
            .await;
        self.settle(result)
    }

    /// Download a document's PDF to `destination`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Fails with the API or file error.
    pub async fn download_document(&mut self, id: i64, destination: &Path) -> ConsoleResult<u64> {
        let token = self.require_session()?;
        let request = ApiRequest::get(format!("/documents/{id}/download"));
        let result = self.api.download(Some(&token), request, destination).await;
        self.settle(result)
    }

    /// Templates as picker entries, labelled `name - description`.
    ///
    /// # Errors
    ///
    /// Fails with the API error.
    pub async fn template_choices(&mut self) -> ConsoleResult<Vec<Choice>> {
        let token = self.require_session()?;
        let result = loaders::fetch_templates(&self.api, Some(&token)).await;
        let templates = self.settle(result)?;
        Ok(templates.iter().map(template_choice).collect())
    }

    /// Upload a PDF template.
    ///
    /// # Errors
    ///
    /// Fails locally on invalid input or an unreadable file, otherwise with
    /// the API error.
    pub async fn upload_template(
        &mut self,
        form: &TemplateUploadForm,
    ) -> ConsoleResult<Mutation<Template>> {
        let upload = form.validate()?;
        let token = self.require_session()?;
        self.require_admin()?;
        let file = file_part(&upload.file, PDF_MIME, "/templates/upload").await?;
        let form = Form::new()
            .text("name", upload.name.clone())
            .text("description", upload.description.clone())
            .part("file", file);
        let request = ApiRequest::post("/templates/upload").multipart(form);
        let result = self.api.call_json::<Template>(Some(&token), request).await;
        let template = self.settle(result)?;
        tracing::info!(template = %template.name, "template uploaded");
        let refreshed = self.refresh_if_active(Tab::Templates).await;
        Ok(Mutation {
            value: template,
            refreshed,
        })
    }

    /// Delete a template after confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Declined`] without a request when the operator
    /// declines, otherwise the API error.
    pub async fn delete_template(
        &mut self,
        id: i64,
        confirm: &mut impl Confirm,
    ) -> ConsoleResult<Mutation<()>> {
        let token = self.require_session()?;
        self.require_admin()?;
        if !confirm.confirm(DELETE_TEMPLATE_PROMPT) {
            return Err(ConsoleError::Declined);
        }
        let result = self
            .api
            .call(Some(&token), ApiRequest::delete(format!("/templates/{id}")))
            .await;
        self.settle(result)?;
        tracing::info!(template_id = id, "template deleted");
        let refreshed = self.refresh_if_active(Tab::Templates).await;
        Ok(Mutation {
            value: (),
            refreshed,
        })
    }

    /// Users as picker entries, labelled `username (email)`.
    ///
    /// # Errors
    ///
    /// Fails unless an administrator is logged in, or with the API error.
    pub async fn user_choices(&mut self) -> ConsoleResult<Vec<Choice>> {
        let token = self.require_session()?;
        self.require_admin()?;
        let result = loaders::fetch_users(&self.api, Some(&token)).await;
        let users = self.settle(result)?;
        Ok(users.iter().map(user_choice).collect())
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Fails locally on invalid input, otherwise with the API error.
    pub async fn create_user(&mut self, form: &NewUserForm) -> ConsoleResult<Mutation<User>> {
        let body = form.validate()?;
        let token = self.require_session()?;
        self.require_admin()?;
        let request = ApiRequest::post("/auth/register").json(&body)?;
        let result = self.api.call_json::<User>(Some(&token), request).await;
        let user = self.settle(result)?;
        tracing::info!(username = %user.username, role = %user.role, "user created");
        let refreshed = self.refresh_if_active(Tab::Users).await;
        Ok(Mutation {
            value: user,
            refreshed,
        })
    }

    /// Activate or deactivate another account.
    ///
    /// # Errors
    ///
    /// Refuses the current user's own account, otherwise the API error.
    pub async fn set_user_active(&mut self, id: i64, active: bool) -> ConsoleResult<Mutation<User>> {
        let token = self.require_session()?;
        self.require_admin()?;
        self.refuse_self(id, "You cannot change the status of your own account")?;
        let body = UserUpdateRequest {
            is_active: Some(active),
            ..UserUpdateRequest::default()
        };
        let request = ApiRequest::put(format!("/users/{id}")).json(&body)?;
        let result = self.api.call_json::<User>(Some(&token), request).await;
        let user = self.settle(result)?;
        tracing::info!(user_id = id, active, "user status changed");
        let refreshed = self.refresh_if_active(Tab::Users).await;
        Ok(Mutation {
            value: user,
            refreshed,
        })
    }

    /// Delete another account after confirmation.
    ///
    /// # Errors
    ///
    /// Refuses the current user's own account, returns
    /// [`ConsoleError::Declined`] when the operator declines, otherwise the
    /// API error.
    pub async fn delete_user(
        &mut self,
        id: i64,
        confirm: &mut impl Confirm,
    ) -> ConsoleResult<Mutation<()>> {
        let token = self.require_session()?;
        self.require_admin()?;
        self.refuse_self(id, "You cannot delete your own account")?;
        if !confirm.confirm(DELETE_USER_PROMPT) {
            return Err(ConsoleError::Declined);
        }
        let result = self
            .api
            .call(Some(&token), ApiRequest::delete(format!("/users/{id}")))
            .await;
        self.settle(result)?;
        tracing::info!(user_id = id, "user deleted");
        let refreshed = self.refresh_if_active(Tab::Users).await;
        Ok(Mutation {
            value: (),
            refreshed,
        })
    }

    /// Create a backup archive.
    ///
    /// # Errors
    ///
    /// Fails unless an administrator is logged in, or with the API error.
    pub async fn create_backup(&mut self) -> ConsoleResult<Mutation<BackupCreateResponse>> {
        let token = self.require_session()?;
        self.require_admin()?;
        let result = self
            .api
            .call_json::<BackupCreateResponse>(Some(&token), ApiRequest::post("/admin/backup/create"))
            .await;
        let backup = self.settle(result)?;
        tracing::info!(backup = %backup.backup_file, "backup created");
        let refreshed = self.refresh_if_active(Tab::Backup).await;
        Ok(Mutation {
            value: backup,
            refreshed,
        })
    }

    /// Download a backup archive to `destination`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid name, the API error or a file error.
    pub async fn download_backup(&mut self, name: &str, destination: &Path) -> ConsoleResult<u64> {
        let token = self.require_session()?;
        self.require_admin()?;
        validate_backup_name(name)?;
        let request = ApiRequest::get(format!("/admin/backup/download/{name}"));
        let result = self.api.download(Some(&token), request, destination).await;
        self.settle(result)
    }

    /// Restore server data from the named archive after confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Declined`] without a request when the operator
    /// declines, otherwise the API error.
    pub async fn restore_backup(
        &mut self,
        name: &str,
        confirm: &mut impl Confirm,
    ) -> ConsoleResult<String> {
        let token = self.require_session()?;
        self.require_admin()?;
        validate_backup_name(name)?;
        if !confirm.confirm(&restore_prompt(name)) {
            return Err(ConsoleError::Declined);
        }
        let body = BackupRestoreRequest {
            backup_file: name.to_string(),
        };
        let request = ApiRequest::post("/admin/backup/restore").json(&body)?;
        let result = self.api.call(Some(&token), request).await;
        let body = self.settle(result)?;
        tracing::info!(backup = name, "backup restored");
        Ok(restore_message(body))
    }

    /// Upload a local archive and restore from it after confirmation.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::Declined`] without a request when the operator
    /// declines, otherwise the file or API error.
    pub async fn restore_upload(
        &mut self,
        archive: &Path,
        confirm: &mut impl Confirm,
    ) -> ConsoleResult<String> {
        let token = self.require_session()?;
        self.require_admin()?;
        let label = archive
            .file_name()
            .map_or_else(|| archive.display().to_string(), |name| name.to_string_lossy().into_owned());
        if !confirm.confirm(&restore_prompt(&label)) {
            return Err(ConsoleError::Declined);
        }
        let file = file_part(archive, ZIP_MIME, "/admin/backup/restore-upload").await?;
        let request =
            ApiRequest::post("/admin/backup/restore-upload").multipart(Form::new().part("file", file));
        let result = self.api.call(Some(&token), request).await;
        let body = self.settle(result)?;
        tracing::info!(archive = %label, "backup restored from upload");
        Ok(restore_message(body))
    }

    /// Server-side sync configuration.
    ///
    /// # Errors
    ///
    /// Fails unless an administrator is logged in, or with the API error.
    pub async fn sync_status(&mut self) -> ConsoleResult<SyncStatus> {
        let token = self.require_session()?;
        self.require_admin()?;
        let result = loaders::fetch_sync_status(&self.api, Some(&token)).await;
        self.settle(result)
    }

    /// Test SMB connectivity.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings or the API error.
    pub async fn test_smb(&mut self, config: &SmbConfig) -> ConsoleResult<ConnectionReport> {
        let token = self.require_admin_session()?;
        let result = SyncClient::new(&self.api, Some(&token)).test_smb(config).await;
        self.settle(result)
    }

    /// Sync to an SMB share.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings or the API error.
    pub async fn sync_smb(
        &mut self,
        config: &SmbConfig,
        sync_type: SyncType,
    ) -> ConsoleResult<SyncReport> {
        let token = self.require_admin_session()?;
        let result = SyncClient::new(&self.api, Some(&token))
            .sync_smb(config, sync_type)
            .await;
        self.settle(result)
    }

    /// Test Nextcloud connectivity.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings or the API error.
    pub async fn test_nextcloud(
        &mut self,
        config: &NextcloudConfig,
    ) -> ConsoleResult<ConnectionReport> {
        let token = self.require_admin_session()?;
        let result = SyncClient::new(&self.api, Some(&token))
            .test_nextcloud(config)
            .await;
        self.settle(result)
    }

    /// Sync to a Nextcloud account.
    ///
    /// # Errors
    ///
    /// Fails on invalid settings or the API error.
    pub async fn sync_nextcloud(
        &mut self,
        config: &NextcloudConfig,
        sync_type: SyncType,
    ) -> ConsoleResult<SyncReport> {
        let token = self.require_admin_session()?;
        let result = SyncClient::new(&self.api, Some(&token))
            .sync_nextcloud(config, sync_type)
            .await;
        self.settle(result)
    }

    /// Sync to a directory on the server.
    ///
    /// # Errors
    ///
    /// Fails on a blank target or the API error.
    pub async fn sync_local(&mut self, target: &str, sync_type: SyncType) -> ConsoleResult<SyncReport> {
        let token = self.require_admin_session()?;
        let result = SyncClient::new(&self.api, Some(&token))
            .sync_local(target, sync_type)
            .await;
        self.settle(result)
    }

    async fn fetch_me(&self, token: &str) -> ApiResult<User> {
        self.api
            .call_json(Some(token), ApiRequest::get("/users/me"))
            .await
    }

    async fn refresh_if_active(&mut self, tab: Tab) -> Option<LoadResult> {
        if self.view.mode() != Mode::App || self.view.active() != tab {
            return None;
        }
        let ticket = self.view.refresh();
        Some(self.load(ticket).await)
    }

    fn settle<T, E: Into<ConsoleError>>(&mut self, result: Result<T, E>) -> ConsoleResult<T> {
        result.map_err(|err| {
            let err = err.into();
            if err.is_unauthorized() {
                self.expire_session();
            }
            err
        })
    }

    fn expire_session(&mut self) {
        tracing::warn!("session rejected by server; logging out");
        self.session.clear();
        self.view.show_login();
        if let Err(err) = self.store.clear() {
            tracing::warn!(error = %err, "failed to clear stored token");
        }
    }

    fn require_session(&self) -> ConsoleResult<String> {
        if self.view.mode() != Mode::App {
            return Err(ConsoleError::NotAuthenticated);
        }
        self.session
            .token
            .clone()
            .ok_or(ConsoleError::NotAuthenticated)
    }

    fn require_admin(&self) -> ConsoleResult<()> {
        if self.session.is_admin() {
            Ok(())
        } else {
            Err(ConsoleError::AdminRequired)
        }
    }

    fn require_admin_session(&self) -> ConsoleResult<String> {
        let token = self.require_session()?;
        self.require_admin()?;
        Ok(token)
    }

    fn refuse_self(&self, id: i64, message: &str) -> ConsoleResult<()> {
        if self.current_user().is_some_and(|user| user.id == id) {
            return Err(ConsoleError::precondition(message));
        }
        Ok(())
    }
}

fn template_choice(template: &Template) -> Choice {
    let label = match template.description.as_deref().filter(|d| !d.is_empty()) {
        Some(description) => format!("{} - {description}", template.name),
        None => template.name.clone(),
    };
    Choice {
        id: template.id,
        label,
    }
}

fn user_choice(user: &User) -> Choice {
    let label = if user.email.is_empty() {
        user.username.clone()
    } else {
        format!("{} ({})", user.username, user.email)
    };
    Choice { id: user.id, label }
}

fn validate_backup_name(name: &str) -> ConsoleResult<()> {
    let name = name.trim();
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(ConsoleError::precondition("Invalid backup name"));
    }
    Ok(())
}

fn restore_message(body: ApiBody) -> String {
    match body {
        ApiBody::Json(value) => serde_json::from_value::<MessageResponse>(value)
            .map(|response| response.message)
            .ok()
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| RESTORE_SUCCESS_MESSAGE.to_string()),
        ApiBody::Text(_) => RESTORE_SUCCESS_MESSAGE.to_string(),
    }
}

async fn file_part(path: &Path, mime: &str, endpoint: &str) -> ApiResult<Part> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path
        .file_name()
        .map_or_else(|| "upload".to_string(), |name| name.to_string_lossy().into_owned());
    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime)
        .map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })
}
