//! Tab router and per-tab request epochs.
//!
//! # Design
//! - Exactly one supermode is active: [`Mode::Login`] or [`Mode::App`].
//! - Each tab keeps its own page, filters and epoch. Any transition that
//!   changes what a tab should show bumps its epoch and hands out a fresh
//!   [`LoadTicket`]; responses carrying an older ticket are discarded.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Supermode of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// No session; only the login form is reachable.
    #[default]
    Login,
    /// Authenticated; tabs are reachable.
    App,
}

/// Top-level views of the app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Tab {
    /// Generated documents.
    #[default]
    Documents,
    /// PDF templates.
    Templates,
    /// User accounts.
    Users,
    /// Audit trail.
    Audit,
    /// Backup archives.
    Backup,
    /// Remote sync targets.
    Sync,
}

impl Tab {
    /// Every tab in display order.
    pub const ALL: [Self; 6] = [
        Self::Documents,
        Self::Templates,
        Self::Users,
        Self::Audit,
        Self::Backup,
        Self::Sync,
    ];

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Documents => "documents",
            Self::Templates => "templates",
            Self::Users => "users",
            Self::Audit => "audit",
            Self::Backup => "backup",
            Self::Sync => "sync",
        }
    }

    /// Whether only administrators may open the tab.
    #[must_use]
    pub const fn requires_admin(self) -> bool {
        !matches!(self, Self::Documents)
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a tab name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTab(pub String);

impl fmt::Display for UnknownTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tab '{}'", self.0)
    }
}

impl std::error::Error for UnknownTab {}

impl FromStr for Tab {
    type Err = UnknownTab;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "documents" | "docs" => Ok(Self::Documents),
            "templates" => Ok(Self::Templates),
            "users" => Ok(Self::Users),
            "audit" | "logs" => Ok(Self::Audit),
            "backup" | "backups" => Ok(Self::Backup),
            "sync" => Ok(Self::Sync),
            _ => Err(UnknownTab(value.to_string())),
        }
    }
}

/// Filters applied to the documents list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilters {
    /// Restrict to documents requested by this user id.
    pub created_by: Option<i64>,
    /// Inclusive lower bound, `YYYY-MM-DD`.
    pub date_from: Option<String>,
    /// Inclusive upper bound, `YYYY-MM-DD`.
    pub date_to: Option<String>,
}

impl DocumentFilters {
    /// Whether no filter is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.created_by.is_none() && self.date_from.is_none() && self.date_to.is_none()
    }
}

/// Per-tab filter state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabFilters {
    /// Documents list filters.
    pub documents: DocumentFilters,
    /// Active title search; replaces the list while set.
    pub search: Option<String>,
    /// Audit logs scoped to one user.
    pub audit_user: Option<i64>,
}

/// Page, filters and epoch of one tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabState {
    /// Zero-based page.
    pub page: u32,
    /// Filters in force.
    pub filters: TabFilters,
    /// Incremented on every transition that invalidates in-flight loads.
    pub epoch: u64,
    /// Whether the last applied load reported a further page.
    pub has_next: bool,
}

/// Snapshot of what a load should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabQuery {
    /// Zero-based page.
    pub page: u32,
    /// Filters at the time the load was issued.
    pub filters: TabFilters,
}

/// Identifies which request a response belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    /// Tab the load was issued for.
    pub tab: Tab,
    /// Epoch of that tab at issue time.
    pub epoch: u64,
    /// Query snapshot.
    pub query: TabQuery,
}

/// Supermode, active tab and per-tab state.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    mode: Mode,
    active: Tab,
    tabs: BTreeMap<Tab, TabState>,
}

impl ViewState {
    /// Fresh state: login mode, documents active.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current supermode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Currently active tab.
    #[must_use]
    pub const fn active(&self) -> Tab {
        self.active
    }

    /// State of `tab` (default when never visited).
    #[must_use]
    pub fn tab(&self, tab: Tab) -> TabState {
        self.tabs.get(&tab).cloned().unwrap_or_default()
    }

    fn entry(&mut self, tab: Tab) -> &mut TabState {
        self.tabs.entry(tab).or_default()
    }

    /// Switch to the app with the documents tab active.
    pub fn enter_app(&mut self) -> LoadTicket {
        self.mode = Mode::App;
        self.select(Tab::Documents)
    }

    /// Switch to the login view. Every tab epoch is bumped so that in-flight
    /// loads from the previous session are discarded.
    pub fn show_login(&mut self) {
        self.mode = Mode::Login;
        self.active = Tab::Documents;
        for tab in Tab::ALL {
            let state = self.entry(tab);
            let epoch = state.epoch + 1;
            *state = TabState {
                epoch,
                ..TabState::default()
            };
        }
    }

    /// Activate `tab`, keeping its last page and filters.
    pub fn select(&mut self, tab: Tab) -> LoadTicket {
        self.active = tab;
        self.bump(tab)
    }

    /// Reissue the load for the active tab.
    pub fn refresh(&mut self) -> LoadTicket {
        self.bump(self.active)
    }

    /// Move the active tab to `page`.
    pub fn set_page(&mut self, page: u32) -> LoadTicket {
        let tab = self.active;
        self.entry(tab).page = page;
        self.bump(tab)
    }

    /// Replace the documents filters and reset to page 0. Clears any search.
    pub fn set_document_filters(&mut self, filters: DocumentFilters) -> LoadTicket {
        self.active = Tab::Documents;
        let state = self.entry(Tab::Documents);
        state.page = 0;
        state.filters.search = None;
        state.filters.documents = filters;
        self.bump(Tab::Documents)
    }

    /// Replace the documents list with a title search. A blank query drops
    /// the search and reloads the list from page 0.
    pub fn set_search(&mut self, query: &str) -> LoadTicket {
        self.active = Tab::Documents;
        let query = query.trim();
        let state = self.entry(Tab::Documents);
        state.page = 0;
        state.filters.search = (!query.is_empty()).then(|| query.to_string());
        self.bump(Tab::Documents)
    }

    /// Scope the audit tab to one user (or none) and reset to page 0.
    pub fn set_audit_user(&mut self, user_id: Option<i64>) -> LoadTicket {
        self.active = Tab::Audit;
        let state = self.entry(Tab::Audit);
        state.page = 0;
        state.filters.audit_user = user_id;
        self.bump(Tab::Audit)
    }

    /// Whether a response for `ticket` should still be applied.
    #[must_use]
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.mode == Mode::App
            && self.active == ticket.tab
            && self.tabs.get(&ticket.tab).map_or(0, |state| state.epoch) == ticket.epoch
    }

    /// Remember whether the applied page of `tab` has a successor.
    pub fn record_has_next(&mut self, tab: Tab, has_next: bool) {
        self.entry(tab).has_next = has_next;
    }

    fn bump(&mut self, tab: Tab) -> LoadTicket {
        let state = self.entry(tab);
        state.epoch += 1;
        LoadTicket {
            tab,
            epoch: state.epoch,
            query: TabQuery {
                page: state.page,
                filters: state.filters.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_login_with_documents_active() {
        let view = ViewState::new();
        assert_eq!(view.mode(), Mode::Login);
        assert_eq!(view.active(), Tab::Documents);
    }

    #[test]
    fn newer_ticket_supersedes_older_one() {
        let mut view = ViewState::new();
        let first = view.enter_app();
        let second = view.set_page(1);
        assert!(!view.is_current(&first));
        assert!(view.is_current(&second));
        assert_eq!(second.query.page, 1);
    }

    #[test]
    fn ticket_for_inactive_tab_is_stale() {
        let mut view = ViewState::new();
        let documents = view.enter_app();
        let _ = view.select(Tab::Users);
        assert!(!view.is_current(&documents));
    }

    #[test]
    fn returning_to_a_tab_keeps_page_but_not_old_tickets() {
        let mut view = ViewState::new();
        view.enter_app();
        let paged = view.set_page(3);
        view.select(Tab::Audit);
        let back = view.select(Tab::Documents);
        assert_eq!(back.query.page, 3);
        assert!(!view.is_current(&paged));
        assert!(view.is_current(&back));
    }

    #[test]
    fn filters_reset_page_and_search() {
        let mut view = ViewState::new();
        view.enter_app();
        view.set_search("invoice");
        view.set_page(2);
        let ticket = view.set_document_filters(DocumentFilters {
            created_by: Some(4),
            ..DocumentFilters::default()
        });
        assert_eq!(ticket.query.page, 0);
        assert_eq!(ticket.query.filters.search, None);
        assert_eq!(ticket.query.filters.documents.created_by, Some(4));
    }

    #[test]
    fn blank_search_clears_the_query() {
        let mut view = ViewState::new();
        view.enter_app();
        assert_eq!(
            view.set_search(" report ").query.filters.search.as_deref(),
            Some("report")
        );
        assert_eq!(view.set_search("   ").query.filters.search, None);
    }

    #[test]
    fn login_view_invalidates_every_ticket() {
        let mut view = ViewState::new();
        view.enter_app();
        let ticket = view.set_page(1);
        view.show_login();
        assert!(!view.is_current(&ticket));
        assert_eq!(view.mode(), Mode::Login);
        assert_eq!(view.tab(Tab::Documents).page, 0);

        let fresh = view.enter_app();
        assert!(view.is_current(&fresh));
        assert!(fresh.epoch > ticket.epoch);
    }

    #[test]
    fn tab_names_parse_with_aliases() {
        assert_eq!("Docs".parse::<Tab>(), Ok(Tab::Documents));
        assert_eq!("backups".parse::<Tab>(), Ok(Tab::Backup));
        assert!("reports".parse::<Tab>().is_err());
        for tab in Tab::ALL {
            assert_eq!(tab.as_str().parse::<Tab>(), Ok(tab));
        }
        assert!(!Tab::Documents.requires_admin());
        assert!(Tab::Sync.requires_admin());
    }
}
