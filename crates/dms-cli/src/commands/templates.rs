use dms_console::Tab;
use dms_console::console::TEMPLATE_UPLOADED_MESSAGE;
use dms_console::forms::TemplateUploadForm;

use crate::cli::{IdArgs, TemplateUploadArgs};
use crate::client::{AppContext, CliResult, confirmer};
use crate::output::{render_message, render_view};

pub(crate) async fn handle_list(ctx: &mut AppContext) -> CliResult<()> {
    let ticket = ctx.console.select_tab(Tab::Templates)?;
    let view = ctx.load(ticket).await?;
    println!("{}", render_view(&view, ctx.output, ctx.offset)?);
    Ok(())
}

pub(crate) async fn handle_upload(ctx: &mut AppContext, args: TemplateUploadArgs) -> CliResult<()> {
    let form = TemplateUploadForm {
        name: args.name,
        description: args.description,
        file: Some(args.file),
    };
    let uploaded = ctx.console.upload_template(&form).await?;
    tracing::debug!(template_id = uploaded.value.id, "template stored");
    println!("{}", render_message(TEMPLATE_UPLOADED_MESSAGE, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_remove(ctx: &mut AppContext, args: IdArgs) -> CliResult<()> {
    let mut confirm = confirmer(ctx.assume_yes);
    ctx.console.delete_template(args.id, &mut confirm).await?;
    println!("{}", render_message("Template deleted", ctx.output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{admin_json, mock_json, resumed_context, user_json};
    use anyhow::anyhow;
    use dms_console::MemoryTokenStore;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::fs;

    #[tokio::test]
    async fn listing_templates_requires_admin() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, user_json()).await;

        let err = handle_list(&mut ctx).await.expect_err("not admin");
        assert_eq!(err.exit_code(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn upload_sends_the_pdf_as_multipart() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        let upload = mock_json(
            &server,
            POST,
            "/api/templates/upload",
            json!({
                "id": 4,
                "name": "Letterhead",
                "description": "",
                "file_name": "letterhead.pdf",
                "created_at": "2024-01-01T00:00:00"
            }),
        );
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("letterhead.pdf");
        fs::write(&file, b"%PDF-1.4")?;

        handle_upload(
            &mut ctx,
            TemplateUploadArgs {
                file,
                name: "Letterhead".into(),
                description: String::new(),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        upload.assert();
        Ok(())
    }

    #[tokio::test]
    async fn remove_deletes_after_confirmation() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/api/templates/4");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "message": "Template deleted successfully" }));
        });

        handle_remove(&mut ctx, IdArgs { id: 4 })
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        delete.assert();
        Ok(())
    }

    #[tokio::test]
    async fn declined_removal_issues_no_request() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        ctx.assume_yes = false;

        if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
            return Ok(());
        }
        let err = handle_remove(&mut ctx, IdArgs { id: 4 })
            .await
            .expect_err("declined");
        assert_eq!(err.display_message(), "cancelled");
        Ok(())
    }
}
