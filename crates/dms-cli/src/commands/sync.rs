use anyhow::anyhow;
use dms_api_models::{NextcloudConfig, SmbConfig, SyncType};
use dms_console::{ConnectionReport, SyncReport, Tab};

use crate::cli::{LocalSyncArgs, NextcloudArgs, NextcloudSyncArgs, SmbArgs, SmbSyncArgs};
use crate::client::{AppContext, CliError, CliResult, prompt_secret};
use crate::output::{render_connection, render_sync_report, render_view};

pub(crate) async fn handle_status(ctx: &mut AppContext) -> CliResult<()> {
    let ticket = ctx.console.select_tab(Tab::Sync)?;
    let view = ctx.load(ticket).await?;
    println!("{}", render_view(&view, ctx.output, ctx.offset)?);
    Ok(())
}

pub(crate) async fn handle_test_smb(ctx: &mut AppContext, args: SmbArgs) -> CliResult<()> {
    let config = smb_config(args)?;
    let report = ctx.console.test_smb(&config).await?;
    emit_connection(&report, ctx)
}

pub(crate) async fn handle_smb(ctx: &mut AppContext, args: SmbSyncArgs) -> CliResult<()> {
    let config = smb_config(args.target)?;
    let report = ctx
        .console
        .sync_smb(&config, SyncType::from(args.sync_type))
        .await?;
    emit_sync(&report, ctx)
}

pub(crate) async fn handle_test_nextcloud(
    ctx: &mut AppContext,
    args: NextcloudArgs,
) -> CliResult<()> {
    let config = nextcloud_config(args)?;
    let report = ctx.console.test_nextcloud(&config).await?;
    emit_connection(&report, ctx)
}

pub(crate) async fn handle_nextcloud(ctx: &mut AppContext, args: NextcloudSyncArgs) -> CliResult<()> {
    let config = nextcloud_config(args.target)?;
    let report = ctx
        .console
        .sync_nextcloud(&config, SyncType::from(args.sync_type))
        .await?;
    emit_sync(&report, ctx)
}

pub(crate) async fn handle_local(ctx: &mut AppContext, args: LocalSyncArgs) -> CliResult<()> {
    let report = ctx
        .console
        .sync_local(&args.target, SyncType::from(args.sync_type))
        .await?;
    emit_sync(&report, ctx)
}

fn smb_config(args: SmbArgs) -> CliResult<SmbConfig> {
    let password = match args.password {
        Some(password) => password,
        None => prompt_secret("SMB password: ", "--password")?,
    };
    Ok(SmbConfig {
        host: args.host,
        port: args.port,
        username: args.username,
        password,
        share: args.share,
        path: args.path,
    })
}

fn nextcloud_config(args: NextcloudArgs) -> CliResult<NextcloudConfig> {
    let password = match args.password {
        Some(password) => password,
        None => prompt_secret("Nextcloud password: ", "--password")?,
    };
    Ok(NextcloudConfig {
        url: args.url,
        username: args.username,
        password,
        path: args.path,
    })
}

fn emit_connection(report: &ConnectionReport, ctx: &AppContext) -> CliResult<()> {
    println!("{}", render_connection(report, ctx.output)?);
    if report.connected {
        Ok(())
    } else {
        Err(CliError::failure(anyhow!(report.message.clone())))
    }
}

fn emit_sync(report: &SyncReport, ctx: &AppContext) -> CliResult<()> {
    println!("{}", render_sync_report(report, ctx.output)?);
    if report.success {
        Ok(())
    } else {
        Err(CliError::failure(anyhow!(report.headline.clone())))
    }
}
