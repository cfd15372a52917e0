use std::path::PathBuf;

use dms_console::Tab;
use dms_console::display::format_megabytes;

use crate::cli::{ArchiveArgs, BackupDownloadArgs, BackupNameArgs};
use crate::client::{AppContext, CliResult, confirmer};
use crate::output::{render_backup_created, render_message, render_view};

pub(crate) async fn handle_create(ctx: &mut AppContext) -> CliResult<()> {
    let created = ctx.console.create_backup().await?;
    println!("{}", render_backup_created(&created.value, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_list(ctx: &mut AppContext) -> CliResult<()> {
    let ticket = ctx.console.select_tab(Tab::Backup)?;
    let view = ctx.load(ticket).await?;
    println!("{}", render_view(&view, ctx.output, ctx.offset)?);
    Ok(())
}

pub(crate) async fn handle_download(ctx: &mut AppContext, args: BackupDownloadArgs) -> CliResult<()> {
    let destination = args.dest.unwrap_or_else(|| PathBuf::from(&args.name));
    let bytes = ctx.console.download_backup(&args.name, &destination).await?;
    let message = format!(
        "Saved {} ({})",
        destination.display(),
        format_megabytes(bytes)
    );
    println!("{}", render_message(&message, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_restore(ctx: &mut AppContext, args: BackupNameArgs) -> CliResult<()> {
    let mut confirm = confirmer(ctx.assume_yes);
    let message = ctx.console.restore_backup(&args.name, &mut confirm).await?;
    println!("{}", render_message(&message, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_upload(ctx: &mut AppContext, args: ArchiveArgs) -> CliResult<()> {
    let mut confirm = confirmer(ctx.assume_yes);
    let message = ctx.console.restore_upload(&args.archive, &mut confirm).await?;
    println!("{}", render_message(&message, ctx.output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{admin_json, mock_json, resumed_context};
    use anyhow::anyhow;
    use dms_console::MemoryTokenStore;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::fs;

    #[tokio::test]
    async fn create_then_list_backups() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        let create = mock_json(
            &server,
            POST,
            "/api/admin/backup/create",
            json!({ "backup_file": "backup_20240301_101530.zip", "size": 2048 }),
        );
        let list = mock_json(
            &server,
            GET,
            "/api/admin/backup/list",
            json!({ "backups": [{
                "name": "backup_20240301_101530.zip",
                "size": 2048,
                "date": "2024-03-01T10:15:30"
            }]}),
        );

        handle_create(&mut ctx)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        handle_list(&mut ctx)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        create.assert();
        list.assert();
        Ok(())
    }

    #[tokio::test]
    async fn traversal_names_are_refused() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;

        let err = handle_restore(
            &mut ctx,
            BackupNameArgs {
                name: "../etc/passwd".into(),
            },
        )
        .await
        .expect_err("invalid name");
        assert_eq!(err.display_message(), "Invalid backup name");
        Ok(())
    }

    #[tokio::test]
    async fn restore_posts_the_archive_name() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        let restore = server.mock(|when, then| {
            when.method(POST)
                .path("/api/admin/backup/restore")
                .json_body(json!({ "backup_file": "backup_1.zip" }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "message": "Restore successful" }));
        });

        handle_restore(
            &mut ctx,
            BackupNameArgs {
                name: "backup_1.zip".into(),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        restore.assert();
        Ok(())
    }

    #[tokio::test]
    async fn download_saves_under_the_backup_name() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        server.mock(|when, then| {
            when.method(GET).path("/api/admin/backup/download/backup_1.zip");
            then.status(200)
                .header("content-type", "application/zip")
                .body("PK");
        });
        let dir = tempfile::tempdir()?;
        let dest = dir.path().join("copy.zip");

        handle_download(
            &mut ctx,
            BackupDownloadArgs {
                name: "backup_1.zip".into(),
                dest: Some(dest.clone()),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(fs::read(&dest)?, b"PK");
        Ok(())
    }
}
