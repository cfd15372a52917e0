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
#![allow(clippy::module_name_repetitions)]

//! Client-side controller for the DMS administration backend.
//!
//! Layout:
//! - `client.rs`: REST client with bearer auth and uniform error surfacing
//! - `session.rs`: session state and durable token storage
//! - `view.rs`: login/app supermode, tab router and load tickets
//! - `loaders.rs`: per-entity list fetchers and their view-models
//! - `sync.rs`: SMB, Nextcloud and local sync calls
//! - `forms.rs`: local validation of operator input
//! - `console.rs`: composition root tying the pieces together
//! - `display.rs`: timestamp and size formatting for renderers

pub mod client;
pub mod console;
pub mod display;
pub mod error;
pub mod forms;
pub mod loaders;
pub mod session;
pub mod sync;
pub mod view;

pub use client::{ApiBody, ApiClient, ApiRequest};
pub use console::{Choice, Confirm, Console, FetchOutcome, LoadResult, Mutation};
pub use error::{ApiError, ApiResult, ConsoleError, ConsoleResult, StoreError};
pub use loaders::{ListView, Pagination, PanelView, TabView};
pub use session::{FileTokenStore, MemoryTokenStore, Session, TokenStore};
pub use sync::{ConnectionReport, SyncClient, SyncReport};
pub use view::{DocumentFilters, LoadTicket, Mode, Tab, ViewState};
