use std::fs;
use std::path::PathBuf;

use anyhow::anyhow;
use dms_console::console::{default_document_file_name, document_created_message};
use dms_console::display::format_megabytes;
use dms_console::forms::{NewDocumentForm, SELECT_TEMPLATE_MESSAGE};
use dms_console::{Choice, DocumentFilters};

use crate::cli::{DocsListArgs, DocumentCreateArgs, DocumentDownloadArgs, IdArgs, SearchArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{render_document, render_message, render_view};

pub(crate) async fn handle_list(ctx: &mut AppContext, args: DocsListArgs) -> CliResult<()> {
    let filters = DocumentFilters {
        created_by: args.created_by,
        date_from: args.date_from,
        date_to: args.date_to,
    };
    let mut ticket = ctx.console.filter_documents(filters)?;
    if args.page > 1 {
        ticket = ctx.console.go_to_page(args.page - 1)?;
    }
    let view = ctx.load(ticket).await?;
    println!("{}", render_view(&view, ctx.output, ctx.offset)?);
    Ok(())
}

pub(crate) async fn handle_search(ctx: &mut AppContext, args: SearchArgs) -> CliResult<()> {
    let ticket = ctx.console.search_documents(&args.query)?;
    let view = ctx.load(ticket).await?;
    println!("{}", render_view(&view, ctx.output, ctx.offset)?);
    Ok(())
}

pub(crate) async fn handle_show(ctx: &mut AppContext, args: IdArgs) -> CliResult<()> {
    let document = ctx.console.document(args.id).await?;
    println!("{}", render_document(&document, ctx.output, ctx.offset)?);
    Ok(())
}

pub(crate) async fn handle_download(
    ctx: &mut AppContext,
    args: DocumentDownloadArgs,
) -> CliResult<()> {
    let destination = args
        .dest
        .unwrap_or_else(|| PathBuf::from(default_document_file_name(args.id)));
    let bytes = ctx
        .console
        .download_document(args.id, &destination)
        .await?;
    let message = format!(
        "Saved {} ({})",
        destination.display(),
        format_megabytes(bytes)
    );
    println!("{}", render_message(&message, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_create(ctx: &mut AppContext, args: DocumentCreateArgs) -> CliResult<()> {
    let content = match (args.content, args.content_file) {
        (Some(content), _) => content,
        (None, Some(path)) => fs::read_to_string(&path).map_err(|err| {
            CliError::failure(anyhow!("failed to read {}: {err}", path.display()))
        })?,
        (None, None) => String::new(),
    };
    let template_id = resolve_template(ctx, &args.template).await?;
    let form = NewDocumentForm {
        title: args.title,
        template_id: Some(template_id),
        content,
    };
    let created = ctx.console.create_document(&form).await?;
    println!(
        "{}",
        render_message(&document_created_message(&created.value), ctx.output)?
    );
    Ok(())
}

/// Accept a numeric template id, or a template name matched case-insensitively.
async fn resolve_template(ctx: &mut AppContext, raw: &str) -> CliResult<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CliError::validation(SELECT_TEMPLATE_MESSAGE));
    }
    if let Ok(id) = raw.parse::<i64>() {
        return Ok(id);
    }
    let choices = ctx.console.template_choices().await?;
    find_template(&choices, raw)
        .ok_or_else(|| CliError::validation(format!("unknown template '{raw}'")))
}

fn find_template(choices: &[Choice], name: &str) -> Option<i64> {
    choices
        .iter()
        .find(|choice| {
            choice.label.eq_ignore_ascii_case(name)
                || choice
                    .label
                    .split_once(" - ")
                    .is_some_and(|(label, _)| label.eq_ignore_ascii_case(name))
        })
        .map(|choice| choice.id)
}
