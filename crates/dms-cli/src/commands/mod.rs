//! Command handlers grouped by console tab.

pub(crate) mod audit;
pub(crate) mod auth;
pub(crate) mod backup;
pub(crate) mod documents;
pub(crate) mod shell;
pub(crate) mod sync;
pub(crate) mod templates;
pub(crate) mod users;
