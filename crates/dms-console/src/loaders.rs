//! Per-entity list loaders and their view-models.
//!
//! Fetching and projecting are split: the `fetch_*` functions perform one
//! request each, and [`TabView`] values are built from their results so that
//! the console can decide whether a response is still wanted before turning
//! it into something renderable.

use std::fmt;

use dms_api_models::{
    AuditLogEntry, BackupFile, BackupListResponse, Document, SyncStatus, Template, User,
};

use crate::client::{ApiClient, ApiRequest};
use crate::error::ApiResult;
use crate::view::{DocumentFilters, Tab, TabQuery};

/// Page size of the documents list.
pub const DOCUMENTS_PER_PAGE: u32 = 50;
/// Page size of the audit trail.
pub const AUDIT_PER_PAGE: u32 = 50;

/// Offset pagination controls for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Zero-based page.
    pub page: u32,
    /// Requested page size.
    pub per_page: u32,
    /// Whether a previous page exists.
    pub has_previous: bool,
    /// Whether a further page may exist. A full page is taken as evidence of
    /// more rows, which over-reports when the total is an exact multiple.
    pub has_next: bool,
}

impl Pagination {
    /// Controls for `page` given how many rows it returned.
    #[must_use]
    pub fn for_page(page: u32, per_page: u32, returned: usize) -> Self {
        Self {
            page,
            per_page,
            has_previous: page > 0,
            has_next: usize::try_from(per_page).is_ok_and(|per_page| returned == per_page),
        }
    }

    /// One-based label, `Page N`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("Page {}", self.page.saturating_add(1))
    }

    /// `skip` query value for this page.
    #[must_use]
    pub fn offset(page: u32, per_page: u32) -> u64 {
        u64::from(page) * u64::from(per_page)
    }
}

/// Empty-state copy shown when a collection has no rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyState {
    /// Headline.
    pub title: &'static str,
    /// Optional secondary line.
    pub hint: Option<&'static str>,
}

/// Empty state of the documents list.
pub const DOCUMENTS_EMPTY: EmptyState = EmptyState {
    title: "No documents found",
    hint: Some("No documents match your criteria."),
};
/// Empty state of a document search.
pub const SEARCH_EMPTY: EmptyState = EmptyState {
    title: "No documents found",
    hint: Some("Try a different search term."),
};
/// Empty state of the templates list.
pub const TEMPLATES_EMPTY: EmptyState = EmptyState {
    title: "No templates yet",
    hint: Some("Upload your first PDF template."),
};
/// Empty state of the users list.
pub const USERS_EMPTY: EmptyState = EmptyState {
    title: "No users yet",
    hint: None,
};
/// Empty state of the audit trail.
pub const AUDIT_EMPTY: EmptyState = EmptyState {
    title: "No audit logs yet",
    hint: None,
};
/// Empty state of the backups list.
pub const BACKUPS_EMPTY: EmptyState = EmptyState {
    title: "No backups found",
    hint: None,
};

/// Renderable state of one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListView<T> {
    /// At least one row.
    Items {
        /// Rows in server order.
        rows: Vec<T>,
        /// Controls, for paginated lists.
        pagination: Option<Pagination>,
    },
    /// Nothing to show.
    Empty {
        /// Headline.
        title: String,
        /// Secondary line.
        hint: Option<String>,
        /// Controls for an empty page past the first, so the operator can
        /// step back.
        pagination: Option<Pagination>,
    },
    /// The load failed.
    Failed {
        /// Operator-facing message.
        message: String,
    },
}

impl<T> ListView<T> {
    /// Project an unpaginated collection.
    #[must_use]
    pub fn from_rows(rows: Vec<T>, empty: EmptyState) -> Self {
        if rows.is_empty() {
            return Self::empty(empty, None);
        }
        Self::Items {
            rows,
            pagination: None,
        }
    }

    /// Project one page of a paginated collection.
    #[must_use]
    pub fn from_page(rows: Vec<T>, page: u32, per_page: u32, empty: EmptyState) -> Self {
        let pagination = Pagination::for_page(page, per_page, rows.len());
        if rows.is_empty() {
            return Self::empty(empty, (page > 0).then_some(pagination));
        }
        Self::Items {
            rows,
            pagination: Some(pagination),
        }
    }

    /// `Failed to load <entity>: <error>`.
    #[must_use]
    pub fn failed(entity: &str, error: &impl fmt::Display) -> Self {
        Self::Failed {
            message: format!("Failed to load {entity}: {error}"),
        }
    }

    fn empty(empty: EmptyState, pagination: Option<Pagination>) -> Self {
        Self::Empty {
            title: empty.title.to_string(),
            hint: empty.hint.map(str::to_string),
            pagination,
        }
    }

    /// Pagination controls, when shown.
    #[must_use]
    pub const fn pagination(&self) -> Option<&Pagination> {
        match self {
            Self::Items {
                pagination: Some(pagination),
                ..
            }
            | Self::Empty {
                pagination: Some(pagination),
                ..
            } => Some(pagination),
            _ => None,
        }
    }

    /// Rows, when any.
    #[must_use]
    pub fn rows(&self) -> &[T] {
        match self {
            Self::Items { rows, .. } => rows,
            _ => &[],
        }
    }
}

/// Renderable state of a non-list panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelView<T> {
    /// Data loaded.
    Ready(T),
    /// The load failed.
    Failed {
        /// Operator-facing message.
        message: String,
    },
}

/// View-model of whichever tab is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabView {
    /// Documents list or search results.
    Documents(ListView<Document>),
    /// Templates list.
    Templates(ListView<Template>),
    /// Users list.
    Users(ListView<User>),
    /// Audit trail page.
    Audit(ListView<AuditLogEntry>),
    /// Backup archives.
    Backups(ListView<BackupFile>),
    /// Sync configuration summary.
    Sync(PanelView<SyncStatus>),
}

impl TabView {
    /// Failure view for `tab`. A failed title search reads `Search failed`.
    #[must_use]
    pub fn failed(tab: Tab, query: &TabQuery, error: &impl fmt::Display) -> Self {
        match tab {
            Tab::Documents if query.filters.search.is_some() => {
                Self::Documents(ListView::Failed {
                    message: format!("Search failed: {error}"),
                })
            }
            Tab::Documents => Self::Documents(ListView::failed("documents", error)),
            Tab::Templates => Self::Templates(ListView::failed("templates", error)),
            Tab::Users => Self::Users(ListView::failed("users", error)),
            Tab::Audit => Self::Audit(ListView::failed("audit logs", error)),
            Tab::Backup => Self::Backups(ListView::failed("backups", error)),
            Tab::Sync => Self::Sync(PanelView::Failed {
                message: format!("Failed to load sync status: {error}"),
            }),
        }
    }

    /// Pagination controls of the view, when shown.
    #[must_use]
    pub const fn pagination(&self) -> Option<&Pagination> {
        match self {
            Self::Documents(view) => view.pagination(),
            Self::Audit(view) => view.pagination(),
            _ => None,
        }
    }

    /// Whether the view represents a failed load.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(
            self,
            Self::Documents(ListView::Failed { .. })
                | Self::Templates(ListView::Failed { .. })
                | Self::Users(ListView::Failed { .. })
                | Self::Audit(ListView::Failed { .. })
                | Self::Backups(ListView::Failed { .. })
                | Self::Sync(PanelView::Failed { .. })
        )
    }
}

/// Fetch one page of documents.
///
/// # Errors
///
/// Propagates the API error.
pub async fn fetch_documents(
    api: &ApiClient,
    token: Option<&str>,
    page: u32,
    filters: &DocumentFilters,
) -> ApiResult<Vec<Document>> {
    let request = ApiRequest::get("/documents/")
        .query("skip", Pagination::offset(page, DOCUMENTS_PER_PAGE))
        .query("limit", DOCUMENTS_PER_PAGE)
        .query_opt("created_by", filters.created_by)
        .query_opt("date_from", filters.date_from.as_deref())
        .query_opt("date_to", filters.date_to.as_deref());
    api.call_json(token, request).await
}

/// Search documents by title.
///
/// # Errors
///
/// Propagates the API error.
pub async fn search_documents(
    api: &ApiClient,
    token: Option<&str>,
    title: &str,
) -> ApiResult<Vec<Document>> {
    let request = ApiRequest::get("/documents/search").query("title", title);
    api.call_json(token, request).await
}

/// Fetch every template.
///
/// # Errors
///
/// Propagates the API error.
pub async fn fetch_templates(api: &ApiClient, token: Option<&str>) -> ApiResult<Vec<Template>> {
    api.call_json(token, ApiRequest::get("/templates/")).await
}

/// Fetch every user account.
///
/// # Errors
///
/// Propagates the API error.
pub async fn fetch_users(api: &ApiClient, token: Option<&str>) -> ApiResult<Vec<User>> {
    api.call_json(token, ApiRequest::get("/users/")).await
}

/// Fetch one page of the audit trail, optionally for a single user.
///
/// # Errors
///
/// Propagates the API error.
pub async fn fetch_audit_logs(
    api: &ApiClient,
    token: Option<&str>,
    page: u32,
    user_id: Option<i64>,
) -> ApiResult<Vec<AuditLogEntry>> {
    let endpoint = user_id.map_or_else(|| "/audit/".to_string(), |id| format!("/audit/user/{id}"));
    let request = ApiRequest::get(endpoint)
        .query("skip", Pagination::offset(page, AUDIT_PER_PAGE))
        .query("limit", AUDIT_PER_PAGE);
    api.call_json(token, request).await
}

/// Fetch the backup archives.
///
/// # Errors
///
/// Propagates the API error.
pub async fn fetch_backups(
    api: &ApiClient,
    token: Option<&str>,
) -> ApiResult<Vec<BackupFile>> {
    let response: BackupListResponse = api
        .call_json(token, ApiRequest::get("/admin/backup/list"))
        .await?;
    Ok(response.backups)
}

/// Fetch the server-side sync configuration.
///
/// # Errors
///
/// Propagates the API error.
pub async fn fetch_sync_status(api: &ApiClient, token: Option<&str>) -> ApiResult<SyncStatus> {
    api.call_json(token, ApiRequest::get("/admin/sync/status"))
        .await
}

/// Run the loader for `tab` with `query` and project its result.
///
/// # Errors
///
/// Returns the API error untouched; callers build the failure view so that
/// unauthorized responses can be handled first.
pub async fn load_tab(
    api: &ApiClient,
    token: Option<&str>,
    tab: Tab,
    query: &TabQuery,
) -> ApiResult<TabView> {
    let view = match tab {
        Tab::Documents => match query.filters.search.as_deref() {
            Some(title) => TabView::Documents(ListView::from_rows(
                search_documents(api, token, title).await?,
                SEARCH_EMPTY,
            )),
            None => TabView::Documents(ListView::from_page(
                fetch_documents(api, token, query.page, &query.filters.documents).await?,
                query.page,
                DOCUMENTS_PER_PAGE,
                DOCUMENTS_EMPTY,
            )),
        },
        Tab::Templates => TabView::Templates(ListView::from_rows(
            fetch_templates(api, token).await?,
            TEMPLATES_EMPTY,
        )),
        Tab::Users => TabView::Users(ListView::from_rows(
            fetch_users(api, token).await?,
            USERS_EMPTY,
        )),
        Tab::Audit => TabView::Audit(ListView::from_page(
            fetch_audit_logs(api, token, query.page, query.filters.audit_user).await?,
            query.page,
            AUDIT_PER_PAGE,
            AUDIT_EMPTY,
        )),
        Tab::Backup => TabView::Backups(ListView::from_rows(
            fetch_backups(api, token).await?,
            BACKUPS_EMPTY,
        )),
        Tab::Sync => TabView::Sync(PanelView::Ready(fetch_sync_status(api, token).await?)),
    };
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::TabFilters;
    use httpmock::prelude::*;
    use serde_json::{Value, json};

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::with_client(
            reqwest::Client::new(),
            server.base_url().parse().expect("valid URL"),
        )
    }

    fn document(id: i64) -> Value {
        json!({
            "id": id,
            "document_number": format!("DOC-{id:04}"),
            "title": format!("Document {id}"),
            "template_id": 1,
            "requested_by_id": 1,
            "created_at": "2024-05-01T08:00:00",
            "file_name": format!("doc_{id}.pdf"),
        })
    }

    fn query(page: u32) -> TabQuery {
        TabQuery {
            page,
            filters: TabFilters::default(),
        }
    }

    #[test]
    fn full_page_enables_next() {
        let full = Pagination::for_page(0, 50, 50);
        assert!(full.has_next);
        assert!(!full.has_previous);
        let short = Pagination::for_page(2, 50, 49);
        assert!(!short.has_next);
        assert!(short.has_previous);
        assert_eq!(short.label(), "Page 3");
        assert_eq!(Pagination::offset(2, 50), 100);
    }

    #[test]
    fn last_representable_page_labels_without_overflow() {
        let last = Pagination::for_page(u32::MAX, 50, 50);
        assert_eq!(last.label(), "Page 4294967295");
        assert_eq!(Pagination::offset(u32::MAX, 50), 214_748_364_750);
    }

    #[test]
    fn empty_pages_use_the_empty_state() {
        let first: ListView<u8> = ListView::from_page(Vec::new(), 0, 50, AUDIT_EMPTY);
        assert_eq!(
            first,
            ListView::Empty {
                title: "No audit logs yet".into(),
                hint: None,
                pagination: None,
            }
        );

        let later: ListView<u8> = ListView::from_page(Vec::new(), 3, 50, AUDIT_EMPTY);
        let ListView::Empty {
            title, pagination, ..
        } = &later
        else {
            panic!("expected the empty state on page 3, got {later:?}");
        };
        assert_eq!(title, "No audit logs yet");
        let pagination = pagination.expect("later pages keep a way back");
        assert_eq!(pagination.page, 3);
        assert!(pagination.has_previous);
        assert!(!pagination.has_next);
    }

    #[test]
    fn failure_messages_name_the_entity() {
        let view: ListView<u8> = ListView::failed("templates", &"boom");
        assert_eq!(
            view,
            ListView::Failed {
                message: "Failed to load templates: boom".into()
            }
        );
        let mut search = query(0);
        search.filters.search = Some("x".into());
        assert_eq!(
            TabView::failed(Tab::Documents, &search, &"offline"),
            TabView::Documents(ListView::Failed {
                message: "Search failed: offline".into()
            })
        );
    }

    #[tokio::test]
    async fn documents_request_carries_offset_and_filters() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/documents/")
                .query_param("skip", "50")
                .query_param("limit", "50")
                .query_param("created_by", "7")
                .query_param("date_from", "2024-01-01");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([document(51)]));
        });

        let mut ticket_query = query(1);
        ticket_query.filters.documents = DocumentFilters {
            created_by: Some(7),
            date_from: Some("2024-01-01".into()),
            date_to: None,
        };
        let view = load_tab(&client_for(&server), Some("t"), Tab::Documents, &ticket_query)
            .await
            .expect("load succeeds");
        mock.assert();
        let TabView::Documents(list) = view else {
            panic!("expected documents view");
        };
        assert_eq!(list.rows().len(), 1);
        let pagination = list.pagination().expect("paginated");
        assert!(pagination.has_previous);
        assert!(!pagination.has_next);
    }

    #[tokio::test]
    async fn full_documents_page_reports_next() {
        let server = MockServer::start_async().await;
        let rows: Vec<Value> = (1..=50).map(document).collect();
        server.mock(|when, then| {
            when.method(GET).path("/api/documents/");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(Value::Array(rows));
        });

        let view = load_tab(&client_for(&server), Some("t"), Tab::Documents, &query(0))
            .await
            .expect("load succeeds");
        let pagination = view.pagination().expect("paginated");
        assert!(pagination.has_next);
        assert!(!pagination.has_previous);
    }

    #[tokio::test]
    async fn each_loader_reports_its_empty_state() {
        let server = MockServer::start_async().await;
        for path in ["/api/documents/", "/api/templates/", "/api/users/", "/api/audit/"] {
            server.mock(|when, then| {
                when.method(GET).path(path);
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!([]));
            });
        }
        server.mock(|when, then| {
            when.method(GET).path("/api/documents/search");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/admin/backup/list");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"backups": []}));
        });

        let api = client_for(&server);
        let mut search = query(0);
        search.filters.search = Some("nothing".into());
        let cases = [
            (Tab::Documents, query(0), DOCUMENTS_EMPTY),
            (Tab::Documents, search, SEARCH_EMPTY),
            (Tab::Templates, query(0), TEMPLATES_EMPTY),
            (Tab::Users, query(0), USERS_EMPTY),
            (Tab::Documents, query(3), DOCUMENTS_EMPTY),
            (Tab::Audit, query(0), AUDIT_EMPTY),
            (Tab::Audit, query(1), AUDIT_EMPTY),
            (Tab::Backup, query(0), BACKUPS_EMPTY),
        ];
        for (tab, tab_query, expected) in cases {
            let view = load_tab(&api, Some("t"), tab, &tab_query)
                .await
                .expect("load succeeds");
            let (title, hint) = match view {
                TabView::Documents(ListView::Empty { title, hint, .. })
                | TabView::Templates(ListView::Empty { title, hint, .. })
                | TabView::Users(ListView::Empty { title, hint, .. })
                | TabView::Audit(ListView::Empty { title, hint, .. })
                | TabView::Backups(ListView::Empty { title, hint, .. }) => (title, hint),
                other => panic!("expected empty state for {tab}, got {other:?}"),
            };
            assert_eq!(title, expected.title);
            assert_eq!(hint.as_deref(), expected.hint);
        }
    }

    #[tokio::test]
    async fn audit_can_be_scoped_to_a_user() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/audit/user/3")
                .query_param("skip", "0")
                .query_param("limit", "50");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([{
                    "id": 1,
                    "user_id": 3,
                    "action": "LOGIN",
                    "timestamp": "2024-05-01T08:00:00"
                }]));
        });

        let rows = fetch_audit_logs(&client_for(&server), Some("t"), 0, Some(3))
            .await
            .expect("fetch succeeds");
        mock.assert();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "LOGIN");
    }
}
