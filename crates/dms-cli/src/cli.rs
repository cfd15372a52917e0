//! Argument parsing, logging bootstrap and command dispatch.

use std::path::PathBuf;

use chrono::{FixedOffset, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dms_api_models::{DEFAULT_SMB_PORT, DEFAULT_SYNC_PATH, SyncType};
use dms_console::display::{DEFAULT_DISPLAY_OFFSET, parse_offset};
use dms_console::forms::ROLE_USER;
use dms_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging, invocation_id};
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult};
use crate::commands::{audit, auth, backup, documents, shell, sync, templates, users};

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Parse the command line, run the selected command and return the process
/// exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or(LogFormat::Pretty),
        invocation_id: &trace_id,
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging disabled: {err}");
    }

    let span = tracing::info_span!(
        "dms",
        command = command_name,
        invocation_id = invocation_id()
    );
    let result = async move {
        let mut ctx = AppContext::from_cli(&cli, &trace_id)?;
        dispatch(cli.command, &mut ctx).await
    }
    .instrument(span.clone())
    .await;
    let _entered = span.enter();

    match result {
        Ok(()) => {
            tracing::debug!("command completed");
            0
        }
        Err(err) => {
            let exit_code = err.exit_code();
            let message = err.display_message();
            tracing::debug!(exit_code, "command failed");
            eprintln!("error: {message}");
            exit_code
        }
    }
}

pub(crate) async fn dispatch(command: Command, ctx: &mut AppContext) -> CliResult<()> {
    if command.requires_session() {
        ctx.ensure_session().await?;
    }

    match command {
        Command::Login(args) => auth::handle_login(ctx, args).await,
        Command::Logout => auth::handle_logout(ctx),
        Command::Whoami => auth::handle_whoami(ctx),
        Command::Passwd(args) => auth::handle_passwd(ctx, args).await,
        Command::Docs(command) => match command {
            DocsCommand::Ls(args) => documents::handle_list(ctx, args).await,
            DocsCommand::Search(args) => documents::handle_search(ctx, args).await,
            DocsCommand::Show(args) => documents::handle_show(ctx, args).await,
            DocsCommand::Download(args) => documents::handle_download(ctx, args).await,
            DocsCommand::Create(args) => documents::handle_create(ctx, args).await,
        },
        Command::Templates(command) => match command {
            TemplatesCommand::Ls => templates::handle_list(ctx).await,
            TemplatesCommand::Upload(args) => templates::handle_upload(ctx, args).await,
            TemplatesCommand::Rm(args) => templates::handle_remove(ctx, args).await,
        },
        Command::Users(command) => match command {
            UsersCommand::Ls => users::handle_list(ctx).await,
            UsersCommand::Add(args) => users::handle_add(ctx, args).await,
            UsersCommand::Activate(args) => users::handle_set_active(ctx, args, true).await,
            UsersCommand::Deactivate(args) => users::handle_set_active(ctx, args, false).await,
            UsersCommand::Rm(args) => users::handle_remove(ctx, args).await,
        },
        Command::Audit(AuditCommand::Ls(args)) => audit::handle_list(ctx, args).await,
        Command::Backup(command) => match command {
            BackupCommand::Create => backup::handle_create(ctx).await,
            BackupCommand::Ls => backup::handle_list(ctx).await,
            BackupCommand::Download(args) => backup::handle_download(ctx, args).await,
            BackupCommand::Restore(args) => backup::handle_restore(ctx, args).await,
            BackupCommand::Upload(args) => backup::handle_upload(ctx, args).await,
        },
        Command::Sync(command) => match command {
            SyncCommand::Status => sync::handle_status(ctx).await,
            SyncCommand::TestSmb(args) => sync::handle_test_smb(ctx, args).await,
            SyncCommand::Smb(args) => sync::handle_smb(ctx, args).await,
            SyncCommand::TestNextcloud(args) => sync::handle_test_nextcloud(ctx, args).await,
            SyncCommand::Nextcloud(args) => sync::handle_nextcloud(ctx, args).await,
            SyncCommand::Local(args) => sync::handle_local(ctx, args).await,
        },
        Command::Shell => shell::handle_shell(ctx).await,
    }
}

#[derive(Parser)]
#[command(name = "dms", version, about = "Administrative console for the DMS backend")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "DMS_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "DMS_SESSION_FILE",
        help = "Where the session token is kept (defaults to ~/.config/dms/session.json)"
    )]
    pub(crate) session_file: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "DMS_HTTP_TIMEOUT_SECS",
        default_value_t = 0,
        help = "Per-request timeout in seconds; 0 waits indefinitely"
    )]
    pub(crate) timeout: u64,
    #[arg(long, global = true, env = "DMS_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub(crate) log_level: String,
    #[arg(long, global = true, env = "DMS_LOG_FORMAT", value_parser = parse_log_format)]
    pub(crate) log_format: Option<LogFormat>,
    #[arg(
        long,
        global = true,
        env = "DMS_DISPLAY_OFFSET",
        value_parser = parse_offset_arg,
        default_value = DEFAULT_DISPLAY_OFFSET,
        help = "UTC offset timestamps are shown in, e.g. +05:30"
    )]
    pub(crate) display_offset: FixedOffset,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(
        long,
        short = 'y',
        global = true,
        help = "Answer yes to confirmation prompts"
    )]
    pub(crate) yes: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Authenticate and remember the session
    Login(LoginArgs),
    /// Forget the stored session
    Logout,
    /// Show the logged-in account
    Whoami,
    /// Change the logged-in account's password
    Passwd(PasswdArgs),
    /// Browse and generate documents
    #[command(subcommand)]
    Docs(DocsCommand),
    /// Manage PDF templates
    #[command(subcommand)]
    Templates(TemplatesCommand),
    /// Manage accounts
    #[command(subcommand)]
    Users(UsersCommand),
    /// Read the audit trail
    #[command(subcommand)]
    Audit(AuditCommand),
    /// Create, download and restore backups
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Push data to SMB, Nextcloud or a server directory
    #[command(subcommand)]
    Sync(SyncCommand),
    /// Browse tabs interactively
    Shell,
}

impl Command {
    const fn requires_session(&self) -> bool {
        !matches!(self, Self::Login(_) | Self::Logout)
    }
}

#[derive(Subcommand)]
pub(crate) enum DocsCommand {
    Ls(DocsListArgs),
    Search(SearchArgs),
    Show(IdArgs),
    Download(DocumentDownloadArgs),
    Create(DocumentCreateArgs),
}

#[derive(Subcommand)]
pub(crate) enum TemplatesCommand {
    Ls,
    Upload(TemplateUploadArgs),
    Rm(IdArgs),
}

#[derive(Subcommand)]
pub(crate) enum UsersCommand {
    Ls,
    Add(UserAddArgs),
    Activate(IdArgs),
    Deactivate(IdArgs),
    Rm(IdArgs),
}

#[derive(Subcommand)]
pub(crate) enum AuditCommand {
    Ls(AuditListArgs),
}

#[derive(Subcommand)]
pub(crate) enum BackupCommand {
    Create,
    Ls,
    Download(BackupDownloadArgs),
    Restore(BackupNameArgs),
    Upload(ArchiveArgs),
}

#[derive(Subcommand)]
pub(crate) enum SyncCommand {
    Status,
    TestSmb(SmbArgs),
    Smb(SmbSyncArgs),
    TestNextcloud(NextcloudArgs),
    Nextcloud(NextcloudSyncArgs),
    Local(LocalSyncArgs),
}

#[derive(Args, Default)]
pub(crate) struct LoginArgs {
    #[arg(long, short = 'u', env = "DMS_USERNAME")]
    pub(crate) username: Option<String>,
    #[arg(long, env = "DMS_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
}

#[derive(Args, Default)]
pub(crate) struct PasswdArgs {
    #[arg(long, env = "DMS_CURRENT_PASSWORD", hide_env_values = true)]
    pub(crate) current: Option<String>,
    #[arg(long, help = "New password; prompted twice when omitted")]
    pub(crate) new: Option<String>,
}

#[derive(Args)]
pub(crate) struct IdArgs {
    pub(crate) id: i64,
}

#[derive(Args)]
pub(crate) struct DocsListArgs {
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) page: u32,
    #[arg(long, help = "Only documents requested by this user id (admins only)")]
    pub(crate) created_by: Option<i64>,
    #[arg(long = "from", value_parser = parse_date, help = "Created on or after YYYY-MM-DD")]
    pub(crate) date_from: Option<String>,
    #[arg(long = "to", value_parser = parse_date, help = "Created on or before YYYY-MM-DD")]
    pub(crate) date_to: Option<String>,
}

#[derive(Args)]
pub(crate) struct SearchArgs {
    #[arg(help = "Title fragment; empty lists all documents")]
    pub(crate) query: String,
}

#[derive(Args)]
pub(crate) struct DocumentDownloadArgs {
    pub(crate) id: i64,
    #[arg(long, short = 'd', help = "Destination file (defaults to document_<id>.pdf)")]
    pub(crate) dest: Option<PathBuf>,
}

#[derive(Args)]
pub(crate) struct DocumentCreateArgs {
    #[arg(long)]
    pub(crate) title: String,
    #[arg(long, help = "Template id or name")]
    pub(crate) template: String,
    #[arg(long, conflicts_with = "content_file")]
    pub(crate) content: Option<String>,
    #[arg(long, help = "Read the document body from a file")]
    pub(crate) content_file: Option<PathBuf>,
}

#[derive(Args)]
pub(crate) struct TemplateUploadArgs {
    #[arg(help = "PDF file to upload")]
    pub(crate) file: PathBuf,
    #[arg(long)]
    pub(crate) name: String,
    #[arg(long, default_value = "")]
    pub(crate) description: String,
}

#[derive(Args)]
pub(crate) struct UserAddArgs {
    #[arg(long)]
    pub(crate) username: String,
    #[arg(long)]
    pub(crate) email: String,
    #[arg(long, env = "DMS_NEW_USER_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
    #[arg(long, default_value = ROLE_USER, help = "admin or user")]
    pub(crate) role: String,
}

#[derive(Args)]
pub(crate) struct AuditListArgs {
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) page: u32,
    #[arg(long, help = "Only entries for this user id or username")]
    pub(crate) user: Option<String>,
}

#[derive(Args)]
pub(crate) struct BackupNameArgs {
    pub(crate) name: String,
}

#[derive(Args)]
pub(crate) struct BackupDownloadArgs {
    pub(crate) name: String,
    #[arg(long, short = 'd', help = "Destination file (defaults to the backup name)")]
    pub(crate) dest: Option<PathBuf>,
}

#[derive(Args)]
pub(crate) struct ArchiveArgs {
    #[arg(help = "Local .zip archive to upload and restore")]
    pub(crate) archive: PathBuf,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum SyncTypeArg {
    Documents,
    Logs,
    #[default]
    All,
}

impl From<SyncTypeArg> for SyncType {
    fn from(value: SyncTypeArg) -> Self {
        match value {
            SyncTypeArg::Documents => Self::Documents,
            SyncTypeArg::Logs => Self::Logs,
            SyncTypeArg::All => Self::All,
        }
    }
}

#[derive(Args)]
pub(crate) struct SmbArgs {
    #[arg(long)]
    pub(crate) host: String,
    #[arg(long, default_value_t = DEFAULT_SMB_PORT)]
    pub(crate) port: u16,
    #[arg(long)]
    pub(crate) username: String,
    #[arg(long, env = "DMS_SMB_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
    #[arg(long)]
    pub(crate) share: String,
    #[arg(long, default_value = DEFAULT_SYNC_PATH)]
    pub(crate) path: String,
}

#[derive(Args)]
pub(crate) struct SmbSyncArgs {
    #[command(flatten)]
    pub(crate) target: SmbArgs,
    #[arg(long = "type", value_enum, default_value_t = SyncTypeArg::All)]
    pub(crate) sync_type: SyncTypeArg,
}

#[derive(Args)]
pub(crate) struct NextcloudArgs {
    #[arg(long)]
    pub(crate) url: String,
    #[arg(long)]
    pub(crate) username: String,
    #[arg(long, env = "DMS_NEXTCLOUD_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
    #[arg(long, default_value = DEFAULT_SYNC_PATH)]
    pub(crate) path: String,
}

#[derive(Args)]
pub(crate) struct NextcloudSyncArgs {
    #[command(flatten)]
    pub(crate) target: NextcloudArgs,
    #[arg(long = "type", value_enum, default_value_t = SyncTypeArg::All)]
    pub(crate) sync_type: SyncTypeArg,
}

#[derive(Args)]
pub(crate) struct LocalSyncArgs {
    #[arg(help = "Directory on the server to copy into")]
    pub(crate) target: String,
    #[arg(long = "type", value_enum, default_value_t = SyncTypeArg::All)]
    pub(crate) sync_type: SyncTypeArg,
}

pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    Url::parse(input).map_err(|err| format!("invalid URL '{input}': {err}"))
}

pub(crate) fn parse_date(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|_| trimmed.to_string())
        .map_err(|_| format!("invalid date '{input}': expected YYYY-MM-DD"))
}

fn parse_offset_arg(input: &str) -> Result<FixedOffset, String> {
    parse_offset(input).ok_or_else(|| format!("invalid offset '{input}': expected e.g. +05:30"))
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input
        .parse::<LogFormat>()
        .map_err(|_| format!("invalid log format '{input}': expected json or pretty"))
}

pub(crate) const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Login(_) => "login",
        Command::Logout => "logout",
        Command::Whoami => "whoami",
        Command::Passwd(_) => "passwd",
        Command::Docs(DocsCommand::Ls(_)) => "docs_ls",
        Command::Docs(DocsCommand::Search(_)) => "docs_search",
        Command::Docs(DocsCommand::Show(_)) => "docs_show",
        Command::Docs(DocsCommand::Download(_)) => "docs_download",
        Command::Docs(DocsCommand::Create(_)) => "docs_create",
        Command::Templates(TemplatesCommand::Ls) => "templates_ls",
        Command::Templates(TemplatesCommand::Upload(_)) => "templates_upload",
        Command::Templates(TemplatesCommand::Rm(_)) => "templates_rm",
        Command::Users(UsersCommand::Ls) => "users_ls",
        Command::Users(UsersCommand::Add(_)) => "users_add",
        Command::Users(UsersCommand::Activate(_)) => "users_activate",
        Command::Users(UsersCommand::Deactivate(_)) => "users_deactivate",
        Command::Users(UsersCommand::Rm(_)) => "users_rm",
        Command::Audit(AuditCommand::Ls(_)) => "audit_ls",
        Command::Backup(BackupCommand::Create) => "backup_create",
        Command::Backup(BackupCommand::Ls) => "backup_ls",
        Command::Backup(BackupCommand::Download(_)) => "backup_download",
        Command::Backup(BackupCommand::Restore(_)) => "backup_restore",
        Command::Backup(BackupCommand::Upload(_)) => "backup_upload",
        Command::Sync(SyncCommand::Status) => "sync_status",
        Command::Sync(SyncCommand::TestSmb(_)) => "sync_test_smb",
        Command::Sync(SyncCommand::Smb(_)) => "sync_smb",
        Command::Sync(SyncCommand::TestNextcloud(_)) => "sync_test_nextcloud",
        Command::Sync(SyncCommand::Nextcloud(_)) => "sync_nextcloud",
        Command::Sync(SyncCommand::Local(_)) => "sync_local",
        Command::Shell => "shell",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{admin_json, context};
    use dms_console::MemoryTokenStore;
    use httpmock::prelude::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dms").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[test]
    fn global_flags_have_defaults() {
        let cli = parse(&["whoami"]);
        assert_eq!(cli.output, OutputFormat::Table);
        assert_eq!(cli.timeout, 0);
        assert_eq!(cli.display_offset.local_minus_utc(), 19_800);
        assert!(!cli.yes);
        assert_eq!(command_label(&cli.command), "whoami");
    }

    #[test]
    fn global_flags_are_accepted_after_subcommands() {
        let cli = parse(&[
            "docs",
            "ls",
            "--page",
            "3",
            "--from",
            "2024-01-01",
            "--format",
            "json",
            "--display-offset",
            "Z",
        ]);
        assert_eq!(cli.output, OutputFormat::Json);
        assert_eq!(cli.display_offset.local_minus_utc(), 0);
        let Command::Docs(DocsCommand::Ls(args)) = cli.command else {
            panic!("expected docs ls");
        };
        assert_eq!(args.page, 3);
        assert_eq!(args.date_from.as_deref(), Some("2024-01-01"));
    }

    #[test]
    fn invalid_values_are_rejected_by_the_parser() {
        let argv = |args: &[&'static str]| {
            std::iter::once("dms")
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
        };
        assert!(Cli::try_parse_from(argv(&["docs", "ls", "--from", "01/02/2024"])).is_err());
        assert!(Cli::try_parse_from(argv(&["docs", "ls", "--page", "0"])).is_err());
        assert!(Cli::try_parse_from(argv(&["--api-url", "not a url", "whoami"])).is_err());
        assert!(Cli::try_parse_from(argv(&["--log-format", "xml", "whoami"])).is_err());
        assert!(
            Cli::try_parse_from(argv(&[
                "docs", "create", "--title", "t", "--template", "1", "--content", "x",
                "--content-file", "body.html"
            ]))
            .is_err()
        );
    }

    #[test]
    fn sync_arguments_default_path_port_and_type() {
        let cli = parse(&[
            "sync", "smb", "--host", "nas", "--username", "svc", "--password", "pw", "--share",
            "docs",
        ]);
        let Command::Sync(SyncCommand::Smb(args)) = cli.command else {
            panic!("expected sync smb");
        };
        assert_eq!(args.target.port, DEFAULT_SMB_PORT);
        assert_eq!(args.target.path, DEFAULT_SYNC_PATH);
        assert_eq!(SyncType::from(args.sync_type), SyncType::All);
    }

    #[test]
    fn session_commands_are_gated() {
        assert!(!parse(&["login"]).command.requires_session());
        assert!(!parse(&["logout"]).command.requires_session());
        assert!(parse(&["backup", "ls"]).command.requires_session());
    }

    #[tokio::test]
    async fn dispatch_without_a_token_reports_not_logged_in() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::new();
        let mut ctx = context(&server, &store);

        let err = dispatch(parse(&["whoami"]).command, &mut ctx)
            .await
            .expect_err("no session");
        assert_eq!(err.exit_code(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn dispatch_resumes_a_stored_session() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let me = server.mock(|when, then| {
            when.method(GET)
                .path("/api/users/me")
                .header("authorization", "Bearer stored");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(admin_json());
        });
        let store = MemoryTokenStore::with_token("stored");
        let mut ctx = context(&server, &store);

        dispatch(parse(&["whoami"]).command, &mut ctx)
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        me.assert();
        assert!(ctx.console.session().is_admin());
        Ok(())
    }

    #[tokio::test]
    async fn dispatch_clears_a_rejected_token() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/users/me");
            then.status(401)
                .header("content-type", "application/json")
                .json_body(serde_json::json!({ "detail": "Could not validate credentials" }));
        });
        let store = MemoryTokenStore::with_token("expired");
        let mut ctx = context(&server, &store);

        let err = dispatch(parse(&["docs", "ls"]).command, &mut ctx)
            .await
            .expect_err("rejected token");
        assert_eq!(err.exit_code(), 4);
        assert_eq!(store.snapshot(), None);
        Ok(())
    }
}
