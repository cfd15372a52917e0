use dms_console::Choice;

use crate::cli::AuditListArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_view;

pub(crate) async fn handle_list(ctx: &mut AppContext, args: AuditListArgs) -> CliResult<()> {
    let user_id = match args.user.as_deref() {
        Some(user) => Some(resolve_user(ctx, user).await?),
        None => None,
    };
    let mut ticket = ctx.console.scope_audit(user_id)?;
    if args.page > 1 {
        ticket = ctx.console.go_to_page(args.page - 1)?;
    }
    let view = ctx.load(ticket).await?;
    println!("{}", render_view(&view, ctx.output, ctx.offset)?);
    Ok(())
}

async fn resolve_user(ctx: &mut AppContext, raw: &str) -> CliResult<i64> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return Ok(id);
    }
    let choices = ctx.console.user_choices().await?;
    find_user(&choices, raw).ok_or_else(|| CliError::validation(format!("unknown user '{raw}'")))
}

fn find_user(choices: &[Choice], username: &str) -> Option<i64> {
    choices
        .iter()
        .find(|choice| {
            let name = choice
                .label
                .split_once(" (")
                .map_or(choice.label.as_str(), |(name, _)| name);
            name.eq_ignore_ascii_case(username)
        })
        .map(|choice| choice.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{admin_json, mock_json, resumed_context, user_json};
    use anyhow::anyhow;
    use dms_console::MemoryTokenStore;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn usernames_match_choice_labels() {
        let choices = vec![
            Choice {
                id: 1,
                label: "root (root@example.com)".into(),
            },
            Choice {
                id: 7,
                label: "clerk".into(),
            },
        ];
        assert_eq!(find_user(&choices, "ROOT"), Some(1));
        assert_eq!(find_user(&choices, "clerk"), Some(7));
        assert_eq!(find_user(&choices, "nobody"), None);
    }

    #[tokio::test]
    async fn user_scope_resolves_names_and_pages() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        mock_json(&server, GET, "/api/users/", json!([admin_json(), user_json()]));
        let scoped = server.mock(|when, then| {
            when.method(GET)
                .path("/api/audit/user/7")
                .query_param("skip", "50")
                .query_param("limit", "50");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!([]));
        });

        handle_list(
            &mut ctx,
            AuditListArgs {
                page: 2,
                user: Some("clerk".into()),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        scoped.assert();
        Ok(())
    }

    #[tokio::test]
    async fn audit_is_admin_only() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, user_json()).await;

        let err = handle_list(&mut ctx, AuditListArgs { page: 1, user: None })
            .await
            .expect_err("not admin");
        assert_eq!(err.display_message(), "Admin access required");
        Ok(())
    }
}
