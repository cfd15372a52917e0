//! Output renderers and formatting helpers for CLI commands.
//!
//! Renderers return the text instead of printing it so the interactive shell
//! can route it to its own writer.

use anyhow::anyhow;
use chrono::FixedOffset;
use dms_api_models::{
    AuditLogEntry, BackupCreateResponse, BackupFile, Document, ServerTimestamp, SyncStatus,
    Template, User,
};
use dms_console::console::backup_created_message;
use dms_console::display::{format_megabytes, format_timestamp};
use dms_console::{ConnectionReport, ListView, Pagination, PanelView, SyncReport, TabView};
use serde::Serialize;
use serde_json::{Value, json};

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

const NONE: &str = "-";

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

fn json_value<T: Serialize + ?Sized>(value: &T) -> CliResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

/// One list entity rendered as a fixed-width table row.
pub(crate) trait TableRow {
    fn header() -> String;
    fn row(&self, offset: FixedOffset) -> String;
}

impl TableRow for Document {
    fn header() -> String {
        format!(
            "{:<6} {:<20} {:<32} {:<16} CREATED",
            "ID", "NUMBER", "TITLE", "CREATED BY"
        )
    }

    fn row(&self, offset: FixedOffset) -> String {
        format!(
            "{:<6} {:<20} {:<32} {:<16} {}",
            self.id,
            self.document_number,
            self.title,
            self.creator_label(),
            format_timestamp(&self.created_at, offset)
        )
    }
}

impl TableRow for Template {
    fn header() -> String {
        format!(
            "{:<6} {:<24} {:<32} {:<24} CREATED",
            "ID", "NAME", "DESCRIPTION", "FILE"
        )
    }

    fn row(&self, offset: FixedOffset) -> String {
        format!(
            "{:<6} {:<24} {:<32} {:<24} {}",
            self.id,
            self.name,
            self.description.as_deref().filter(|d| !d.is_empty()).unwrap_or(NONE),
            self.file_name.as_deref().unwrap_or(NONE),
            format_timestamp(&self.created_at, offset)
        )
    }
}

impl TableRow for User {
    fn header() -> String {
        format!(
            "{:<6} {:<16} {:<28} {:<6} {:<9} CREATED",
            "ID", "USERNAME", "EMAIL", "ROLE", "STATUS"
        )
    }

    fn row(&self, offset: FixedOffset) -> String {
        format!(
            "{:<6} {:<16} {:<28} {:<6} {:<9} {}",
            self.id,
            self.username,
            self.email,
            self.role,
            user_status(self),
            format_timestamp(&self.created_at, offset)
        )
    }
}

impl TableRow for AuditLogEntry {
    fn header() -> String {
        format!("{:<24} {:<20} {:<32} DETAILS", "TIME", "ACTION", "USER")
    }

    fn row(&self, offset: FixedOffset) -> String {
        let user = self.user.as_ref().map_or_else(
            || "Unknown".to_string(),
            |user| format!("{} ({})", user.username, user.email),
        );
        format!(
            "{:<24} {:<20} {:<32} {}",
            format_timestamp(&self.timestamp, offset),
            self.action,
            user,
            self.details.as_deref().filter(|d| !d.is_empty()).unwrap_or(NONE)
        )
    }
}

impl TableRow for BackupFile {
    fn header() -> String {
        format!("{:<40} {:>12} CREATED", "NAME", "SIZE")
    }

    fn row(&self, offset: FixedOffset) -> String {
        format!(
            "{:<40} {:>12} {}",
            self.name,
            format_megabytes(self.size),
            format_timestamp(&ServerTimestamp::from(self.date.as_str()), offset)
        )
    }
}

const fn user_status(user: &User) -> &'static str {
    if user.is_active { "Active" } else { "Inactive" }
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn pagination_footer(pagination: &Pagination) -> String {
    format!(
        "{} (previous: {}, next: {})",
        pagination.label(),
        yes_no(pagination.has_previous),
        yes_no(pagination.has_next)
    )
}

fn pagination_json(pagination: &Pagination) -> Value {
    json!({
        "page": pagination.page.saturating_add(1),
        "per_page": pagination.per_page,
        "has_previous": pagination.has_previous,
        "has_next": pagination.has_next,
    })
}

pub(crate) fn render_list<T: TableRow + Serialize>(
    list: &ListView<T>,
    format: OutputFormat,
    offset: FixedOffset,
) -> CliResult<String> {
    match list {
        ListView::Failed { message } => Err(CliError::failure(anyhow!(message.clone()))),
        ListView::Empty {
            title,
            hint,
            pagination,
        } => match format {
            OutputFormat::Json => to_json(&json!({
                "items": [],
                "empty": { "title": title, "hint": hint },
                "pagination": pagination.as_ref().map(pagination_json),
            })),
            OutputFormat::Table => {
                let mut lines = vec![title.clone()];
                lines.extend(hint.clone());
                if let Some(pagination) = pagination {
                    lines.push(pagination_footer(pagination));
                }
                Ok(lines.join("\n"))
            }
        },
        ListView::Items { rows, pagination } => match format {
            OutputFormat::Json => to_json(&json!({
                "items": json_value(rows)?,
                "pagination": pagination.as_ref().map(pagination_json),
            })),
            OutputFormat::Table => {
                let mut lines = Vec::with_capacity(rows.len() + 2);
                lines.push(T::header());
                lines.extend(rows.iter().map(|row| row.row(offset)));
                if let Some(pagination) = pagination {
                    lines.push(pagination_footer(pagination));
                }
                Ok(lines.join("\n"))
            }
        },
    }
}

pub(crate) fn render_view(
    view: &TabView,
    format: OutputFormat,
    offset: FixedOffset,
) -> CliResult<String> {
    match view {
        TabView::Documents(list) => render_list(list, format, offset),
        TabView::Templates(list) => render_list(list, format, offset),
        TabView::Users(list) => render_list(list, format, offset),
        TabView::Audit(list) => render_list(list, format, offset),
        TabView::Backups(list) => render_list(list, format, offset),
        TabView::Sync(PanelView::Ready(status)) => render_sync_status(status, format),
        TabView::Sync(PanelView::Failed { message }) => {
            Err(CliError::failure(anyhow!(message.clone())))
        }
    }
}

pub(crate) fn render_sync_status(status: &SyncStatus, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(status),
        OutputFormat::Table => {
            let field = |value: Option<&str>| value.unwrap_or(NONE).to_string();
            Ok([
                format!("SMB enabled: {}", yes_no(status.smb_enabled)),
                format!("SMB host: {}", field(status.smb_host.as_deref())),
                format!("SMB share: {}", field(status.smb_share.as_deref())),
                format!("Storage directory: {}", field(status.storage_dir.as_deref())),
                format!("Backup directory: {}", field(status.backup_dir.as_deref())),
                format!("Uploads directory: {}", field(status.uploads_dir.as_deref())),
            ]
            .join("\n"))
        }
    }
}

pub(crate) fn render_document(
    document: &Document,
    format: OutputFormat,
    offset: FixedOffset,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(document),
        OutputFormat::Table => {
            let mut lines = vec![
                format!("id: {}", document.id),
                format!("number: {}", document.document_number),
                format!("title: {}", document.title),
            ];
            if let Some(template) = &document.template_name {
                lines.push(format!("template: {template}"));
            } else if let Some(template_id) = document.template_id {
                lines.push(format!("template: #{template_id}"));
            }
            lines.push(format!("created by: {}", document.creator_label()));
            lines.push(format!(
                "created: {}",
                format_timestamp(&document.created_at, offset)
            ));
            if let Some(file_name) = &document.file_name {
                lines.push(format!("file: {file_name}"));
            }
            Ok(lines.join("\n"))
        }
    }
}

pub(crate) fn render_user(
    user: &User,
    format: OutputFormat,
    offset: FixedOffset,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(user),
        OutputFormat::Table => Ok([
            format!("id: {}", user.id),
            format!("username: {}", user.username),
            format!("email: {}", user.email),
            format!("role: {}", user.role),
            format!("status: {}", user_status(user)),
            format!("created: {}", format_timestamp(&user.created_at, offset)),
        ]
        .join("\n")),
    }
}

pub(crate) fn render_message(message: &str, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&json!({ "message": message })),
        OutputFormat::Table => Ok(message.to_string()),
    }
}

pub(crate) fn render_backup_created(
    backup: &BackupCreateResponse,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(backup),
        OutputFormat::Table => Ok(backup_created_message(backup)),
    }
}

pub(crate) fn render_connection(
    report: &ConnectionReport,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&json!({
            "connected": report.connected,
            "message": report.message,
        })),
        OutputFormat::Table => Ok(report.message.clone()),
    }
}

pub(crate) fn render_sync_report(report: &SyncReport, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(&json!({
            "success": report.success,
            "headline": report.headline,
            "detail": report.detail,
        })),
        OutputFormat::Table => Ok(report.detail.as_ref().map_or_else(
            || report.headline.clone(),
            |detail| format!("{}\n{detail}", report.headline),
        )),
    }
}
