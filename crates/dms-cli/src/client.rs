//! Error type, application context and operator prompts shared by handlers.

use std::env;
use std::fmt::{self, Display, Formatter};
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::anyhow;
use chrono::FixedOffset;
use dms_console::{
    ApiClient, ApiError, Console, ConsoleError, FileTokenStore, LoadResult, LoadTicket, Mode,
    TabView, TokenStore,
};

use crate::cli::{Cli, OutputFormat};

pub(crate) const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please log in again.";
pub(crate) const NOT_LOGGED_IN_MESSAGE: &str = "not logged in; run `dms login` first";

const SESSION_DIR: &str = "dms";
const SESSION_FILE: &str = "session.json";
const FALLBACK_SESSION_FILE: &str = ".dms-session.json";

/// CLI-level error type separating operator mistakes, rejected sessions and
/// operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Unauthorized(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
            Self::Unauthorized(_) => 4,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::Unauthorized(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ConsoleError> for CliError {
    fn from(err: ConsoleError) -> Self {
        match err {
            ConsoleError::Precondition(message) => Self::Validation(message),
            ConsoleError::AdminRequired
            | ConsoleError::Declined
            | ConsoleError::Api(ApiError::InvalidCredentials) => Self::Validation(err.to_string()),
            ConsoleError::NotAuthenticated => Self::Unauthorized(NOT_LOGGED_IN_MESSAGE.to_string()),
            ConsoleError::Api(ApiError::Unauthorized) => {
                Self::Unauthorized(SESSION_EXPIRED_MESSAGE.to_string())
            }
            ConsoleError::Api(ApiError::Status { status, message })
                if matches!(status.as_u16(), 400 | 409 | 422) =>
            {
                Self::Validation(message)
            }
            other => Self::Failure(anyhow!(other.to_string())),
        }
    }
}

/// Application context passed to command handlers.
#[derive(Debug)]
pub(crate) struct AppContext {
    pub(crate) console: Console,
    pub(crate) output: OutputFormat,
    pub(crate) offset: FixedOffset,
    pub(crate) assume_yes: bool,
}

impl AppContext {
    /// Build the console from global flags, persisting the token on disk.
    pub(crate) fn from_cli(cli: &Cli, trace_id: &str) -> CliResult<Self> {
        let timeout = (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout));
        let api = ApiClient::new(cli.api_url.clone(), timeout, Some(trace_id))
            .map_err(|err| CliError::failure(anyhow!("failed to build HTTP client: {err}")))?;
        let session_path = cli
            .session_file
            .clone()
            .unwrap_or_else(default_session_path);
        tracing::debug!(path = %session_path.display(), "using session file");
        Self::new(
            api,
            Box::new(FileTokenStore::new(session_path)),
            cli.output,
            cli.display_offset,
            cli.yes,
        )
    }

    pub(crate) fn new(
        api: ApiClient,
        store: Box<dyn TokenStore>,
        output: OutputFormat,
        offset: FixedOffset,
        assume_yes: bool,
    ) -> CliResult<Self> {
        Ok(Self {
            console: Console::new(api, store)?,
            output,
            offset,
            assume_yes,
        })
    }

    /// Resume the stored session, failing when there is none to resume.
    pub(crate) async fn ensure_session(&mut self) -> CliResult<()> {
        match self.console.initialize().await? {
            Mode::App => Ok(()),
            Mode::Login => Err(CliError::Unauthorized(NOT_LOGGED_IN_MESSAGE.to_string())),
        }
    }

    /// Run `ticket` to completion and return the view to render.
    pub(crate) async fn load(&mut self, ticket: LoadTicket) -> CliResult<TabView> {
        settle_load(self.console.load(ticket).await)
    }
}

/// Map a load result onto the view it carries.
pub(crate) fn settle_load(result: LoadResult) -> CliResult<TabView> {
    match result {
        LoadResult::Applied(view) => Ok(view),
        LoadResult::LoggedOut => Err(CliError::Unauthorized(SESSION_EXPIRED_MESSAGE.to_string())),
        LoadResult::Discarded => Err(CliError::failure(anyhow!(
            "load was superseded by a newer request"
        ))),
    }
}

/// Session file location: `$XDG_CONFIG_HOME/dms`, then `$HOME/.config/dms`,
/// then the working directory.
pub(crate) fn default_session_path() -> PathBuf {
    if let Some(config_home) = env::var_os("XDG_CONFIG_HOME").filter(|value| !value.is_empty()) {
        return PathBuf::from(config_home).join(SESSION_DIR).join(SESSION_FILE);
    }
    env::var_os("HOME").filter(|value| !value.is_empty()).map_or_else(
        || PathBuf::from(FALLBACK_SESSION_FILE),
        |home| {
            PathBuf::from(home)
                .join(".config")
                .join(SESSION_DIR)
                .join(SESSION_FILE)
        },
    )
}

/// Confirmation callback for destructive operations. `--yes` skips the
/// question; non-interactive runs decline.
pub(crate) fn confirmer(assume_yes: bool) -> impl FnMut(&str) -> bool {
    move |prompt: &str| assume_yes || ask_confirmation(prompt)
}

fn ask_confirmation(prompt: &str) -> bool {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        tracing::debug!(prompt, "declining confirmation on non-interactive input");
        return false;
    }
    eprint!("{prompt} [y/N] ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if stdin.lock().read_line(&mut answer).is_err() {
        return false;
    }
    is_affirmative(&answer)
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Read one line from stdin after printing `label` to stderr.
pub(crate) fn prompt_line(label: &str) -> CliResult<String> {
    eprint!("{label}");
    let _ = io::stderr().flush();
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|err| CliError::failure(anyhow!("failed to read input: {err}")))?;
    if read == 0 {
        return Err(CliError::validation(format!(
            "no input provided for '{}'",
            label.trim_end_matches([':', ' '])
        )));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Read a secret without echo, or explain which flag to pass when stdin is
/// not a terminal.
pub(crate) fn prompt_secret(label: &str, flag: &str) -> CliResult<String> {
    if io::stdin().is_terminal() {
        rpassword::prompt_password(label)
            .map_err(|err| CliError::failure(anyhow!("failed to read {flag}: {err}")))
    } else {
        Err(CliError::validation(format!(
            "{flag} must be provided when not running interactively"
        )))
    }
}
