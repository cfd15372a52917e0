//! Interactive browser over the console tabs.
//!
//! Each line read from the input is one command; list-changing commands
//! load the active tab and render it before the next prompt.

use std::io::{self, BufRead, BufReader, Write};

use anyhow::anyhow;
use dms_console::{DocumentFilters, LoadTicket, Tab};

use crate::cli::parse_date;
use crate::client::{AppContext, CliError, CliResult, SESSION_EXPIRED_MESSAGE};
use crate::output::{render_user, render_view};

const HELP: &str = "\
commands:
  tab <name>                  documents, templates, users, audit, backup, sync
  next | prev                 move one page
  page <n>                    jump to page n
  filter [created_by=<id>] [from=YYYY-MM-DD] [to=YYYY-MM-DD]
  clear                       drop document filters
  search [text]               search documents by title (blank clears)
  user <id>|all               scope the audit log
  refresh                     reload the active tab
  whoami | logout | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ShellCommand {
    Tab(Tab),
    Next,
    Prev,
    Page(u32),
    Filter(DocumentFilters),
    Clear,
    Search(String),
    AuditUser(Option<i64>),
    Refresh,
    Whoami,
    Logout,
    Help,
    Quit,
}

enum Flow {
    Continue,
    Exit,
}

pub(crate) async fn handle_shell(ctx: &mut AppContext) -> CliResult<()> {
    let input = BufReader::new(io::stdin());
    run_shell(ctx, input, &mut io::stdout()).await
}

async fn run_shell<R, W>(ctx: &mut AppContext, input: R, out: &mut W) -> CliResult<()>
where
    R: BufRead + Send,
    W: Write + Send,
{
    let ticket = ctx.console.refresh()?;
    show(ctx, ticket, out).await?;

    let mut lines = input.lines();
    loop {
        write!(out, "dms:{}> ", ctx.console.view().active()).map_err(write_failed)?;
        out.flush().map_err(write_failed)?;
        let Some(line) = lines.next() else {
            writeln!(out).map_err(write_failed)?;
            break;
        };
        let line = line.map_err(|err| CliError::failure(anyhow!("failed to read input: {err}")))?;
        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                write_line(out, &message)?;
                continue;
            }
        };
        match execute(ctx, command, out).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => break,
            Err(CliError::Unauthorized(message)) => {
                return Err(CliError::Unauthorized(message));
            }
            Err(err) => write_line(out, &format!("error: {}", err.display_message()))?,
        }
    }
    Ok(())
}

async fn execute<W: Write + Send>(
    ctx: &mut AppContext,
    command: ShellCommand,
    out: &mut W,
) -> CliResult<Flow> {
    let ticket = match command {
        ShellCommand::Tab(tab) => ctx.console.select_tab(tab)?,
        ShellCommand::Next => ctx.console.next_page()?,
        ShellCommand::Prev => ctx.console.previous_page()?,
        ShellCommand::Page(page) => ctx.console.go_to_page(page)?,
        ShellCommand::Filter(filters) => ctx.console.filter_documents(filters)?,
        ShellCommand::Clear => ctx.console.filter_documents(DocumentFilters::default())?,
        ShellCommand::Search(query) => ctx.console.search_documents(&query)?,
        ShellCommand::AuditUser(user_id) => ctx.console.scope_audit(user_id)?,
        ShellCommand::Refresh => ctx.console.refresh()?,
        ShellCommand::Whoami => {
            let user = ctx
                .console
                .current_user()
                .ok_or_else(|| CliError::Unauthorized(SESSION_EXPIRED_MESSAGE.to_string()))?;
            write_line(out, &render_user(user, ctx.output, ctx.offset)?)?;
            return Ok(Flow::Continue);
        }
        ShellCommand::Logout => {
            ctx.console.logout()?;
            write_line(out, "Logged out")?;
            return Ok(Flow::Exit);
        }
        ShellCommand::Help => {
            write_line(out, HELP)?;
            return Ok(Flow::Continue);
        }
        ShellCommand::Quit => return Ok(Flow::Exit),
    };
    show(ctx, ticket, out).await?;
    Ok(Flow::Continue)
}

/// Load `ticket` and render the resulting view; a failed list prints its
/// message instead of ending the shell.
async fn show<W: Write + Send>(
    ctx: &mut AppContext,
    ticket: LoadTicket,
    out: &mut W,
) -> CliResult<()> {
    let view = ctx.load(ticket).await?;
    let text = match render_view(&view, ctx.output, ctx.offset) {
        Ok(text) => text,
        Err(err) => format!("error: {}", err.display_message()),
    };
    write_line(out, &text)
}

fn parse_command(line: &str) -> Result<Option<ShellCommand>, String> {
    let line = line.trim();
    let Some((verb, rest)) = split_verb(line) else {
        return Ok(None);
    };
    let command = match verb.to_ascii_lowercase().as_str() {
        "tab" | "open" => {
            let tab = rest.parse::<Tab>().map_err(|err| err.to_string())?;
            ShellCommand::Tab(tab)
        }
        "next" | "n" => ShellCommand::Next,
        "prev" | "p" => ShellCommand::Prev,
        "page" => {
            let page = rest
                .parse::<u32>()
                .ok()
                .filter(|page| *page >= 1)
                .ok_or_else(|| format!("invalid page '{rest}'"))?;
            ShellCommand::Page(page - 1)
        }
        "filter" => ShellCommand::Filter(parse_filters(rest)?),
        "clear" => ShellCommand::Clear,
        "search" => ShellCommand::Search(rest.to_string()),
        "user" => {
            if rest.eq_ignore_ascii_case("all") || rest.is_empty() {
                ShellCommand::AuditUser(None)
            } else {
                let id = rest
                    .parse::<i64>()
                    .map_err(|_| format!("invalid user id '{rest}'"))?;
                ShellCommand::AuditUser(Some(id))
            }
        }
        "refresh" | "r" => ShellCommand::Refresh,
        "whoami" => ShellCommand::Whoami,
        "logout" => ShellCommand::Logout,
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => match other.parse::<Tab>() {
            Ok(tab) if rest.is_empty() => ShellCommand::Tab(tab),
            _ => return Err(format!("unknown command '{verb}'; type 'help'")),
        },
    };
    Ok(Some(command))
}

fn split_verb(line: &str) -> Option<(&str, &str)> {
    if line.is_empty() {
        return None;
    }
    Some(
        line.split_once(char::is_whitespace)
            .map_or((line, ""), |(verb, rest)| (verb, rest.trim())),
    )
}

fn parse_filters(raw: &str) -> Result<DocumentFilters, String> {
    let mut filters = DocumentFilters::default();
    for pair in raw.split_whitespace() {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{pair}'"))?;
        match key {
            "created_by" => {
                let id = value
                    .parse::<i64>()
                    .map_err(|_| format!("invalid user id '{value}'"))?;
                filters.created_by = Some(id);
            }
            "from" => filters.date_from = Some(parse_date(value)?),
            "to" => filters.date_to = Some(parse_date(value)?),
            other => return Err(format!("unknown filter '{other}'")),
        }
    }
    Ok(filters)
}

fn write_line<W: Write>(out: &mut W, text: &str) -> CliResult<()> {
    writeln!(out, "{text}").map_err(write_failed)
}

fn write_failed(err: io::Error) -> CliError {
    CliError::failure(anyhow!("failed to write output: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{admin_json, mock_json, resumed_context, user_json};
    use dms_console::MemoryTokenStore;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn commands_parse_with_arguments() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(
            parse_command("tab Templates"),
            Ok(Some(ShellCommand::Tab(Tab::Templates)))
        );
        assert_eq!(parse_command("audit"), Ok(Some(ShellCommand::Tab(Tab::Audit))));
        assert_eq!(parse_command("page 3"), Ok(Some(ShellCommand::Page(2))));
        assert_eq!(
            parse_command("user all"),
            Ok(Some(ShellCommand::AuditUser(None)))
        );
        assert_eq!(
            parse_command("search offer letter"),
            Ok(Some(ShellCommand::Search("offer letter".into())))
        );
        assert_eq!(
            parse_command("filter created_by=4 from=2024-01-01"),
            Ok(Some(ShellCommand::Filter(DocumentFilters {
                created_by: Some(4),
                date_from: Some("2024-01-01".into()),
                date_to: None,
            })))
        );
    }

    #[test]
    fn malformed_commands_are_reported() {
        assert!(parse_command("page 0").is_err());
        assert!(parse_command("tab invoices").is_err());
        assert!(parse_command("filter since=2024-01-01").is_err());
        assert!(parse_command("filter from=01/02/2024").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[tokio::test]
    async fn shell_switches_tabs_until_quit() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        mock_json(&server, GET, "/api/documents/", json!([]));
        let templates = mock_json(&server, GET, "/api/templates/", json!([]));

        let mut out = Vec::new();
        run_shell(&mut ctx, Cursor::new("tab templates\nquit\n"), &mut out)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        templates.assert();
        let printed = String::from_utf8(out)?;
        assert!(printed.contains("dms:documents> "));
        assert!(printed.contains("dms:templates> "));
        Ok(())
    }

    #[tokio::test]
    async fn shell_reports_errors_and_keeps_going() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, user_json()).await;
        mock_json(&server, GET, "/api/documents/", json!([]));

        let mut out = Vec::new();
        run_shell(&mut ctx, Cursor::new("next\ntab users\nbogus\n"), &mut out)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        let printed = String::from_utf8(out)?;
        assert!(printed.contains("error: No next page"));
        assert!(printed.contains("error: Admin access required"));
        assert!(printed.contains("unknown command 'bogus'"));
        Ok(())
    }

    #[tokio::test]
    async fn expired_session_ends_the_shell() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        server.mock(|when, then| {
            when.method(GET).path("/api/documents/");
            then.status(401)
                .header("content-type", "application/json")
                .json_body(json!({ "detail": "Could not validate credentials" }));
        });

        let mut out = Vec::new();
        let err = run_shell(&mut ctx, Cursor::new("quit\n"), &mut out)
            .await
            .expect_err("session expired");
        assert_eq!(err.exit_code(), 4);
        assert_eq!(err.display_message(), SESSION_EXPIRED_MESSAGE);
        assert_eq!(store.snapshot(), None);
        Ok(())
    }
}
