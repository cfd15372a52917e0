use dms_console::LoadResult;
use dms_console::forms::PasswordChangeForm;

use crate::cli::{LoginArgs, OutputFormat, PasswdArgs};
use crate::client::{
    AppContext, CliError, CliResult, NOT_LOGGED_IN_MESSAGE, SESSION_EXPIRED_MESSAGE, prompt_line,
    prompt_secret,
};
use crate::output::{render_message, render_user};

pub(crate) async fn handle_login(ctx: &mut AppContext, args: LoginArgs) -> CliResult<()> {
    let username = match args.username {
        Some(username) => username,
        None => prompt_line("Username: ")?,
    };
    let password = match args.password {
        Some(password) => password,
        None => prompt_secret("Password: ", "--password")?,
    };

    if ctx.console.login(&username, &password).await? == LoadResult::LoggedOut {
        return Err(CliError::Unauthorized(SESSION_EXPIRED_MESSAGE.to_string()));
    }

    let text = match (ctx.console.current_user(), ctx.output) {
        (Some(user), OutputFormat::Json) => render_user(user, ctx.output, ctx.offset)?,
        (Some(user), OutputFormat::Table) => {
            format!("Logged in as {} ({})", user.username, user.role)
        }
        (None, _) => render_message(
            &format!("Logged in as {}", username.trim()),
            ctx.output,
        )?,
    };
    println!("{text}");
    Ok(())
}

pub(crate) fn handle_logout(ctx: &mut AppContext) -> CliResult<()> {
    ctx.console.logout()?;
    println!("{}", render_message("Logged out", ctx.output)?);
    Ok(())
}

pub(crate) fn handle_whoami(ctx: &AppContext) -> CliResult<()> {
    let user = ctx
        .console
        .current_user()
        .ok_or_else(|| CliError::Unauthorized(NOT_LOGGED_IN_MESSAGE.to_string()))?;
    println!("{}", render_user(user, ctx.output, ctx.offset)?);
    Ok(())
}

pub(crate) async fn handle_passwd(ctx: &mut AppContext, args: PasswdArgs) -> CliResult<()> {
    let current = match args.current {
        Some(current) => current,
        None => prompt_secret("Current password: ", "--current")?,
    };
    let (new, confirm) = match args.new {
        Some(new) => (new.clone(), new),
        None => (
            prompt_secret("New password: ", "--new")?,
            prompt_secret("Confirm new password: ", "--new")?,
        ),
    };
    let form = PasswordChangeForm {
        current,
        new,
        confirm,
    };
    let message = ctx.console.change_password(&form).await?;
    println!("{}", render_message(&message, ctx.output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use crate::client::test_support::{admin_json, context, mock_json, offset, resumed_context};
    use dms_console::{ApiClient, FileTokenStore, MemoryTokenStore, Mode, TokenStore};
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn login_persists_the_token() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let login = server.mock(|when, then| {
            when.method(POST)
                .path("/api/auth/login")
                .header("content-type", "application/x-www-form-urlencoded");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "access_token": "fresh", "token_type": "bearer" }));
        });
        mock_json(&server, GET, "/api/users/me", admin_json());
        mock_json(&server, GET, "/api/documents/", json!([]));
        let store = MemoryTokenStore::new();
        let mut ctx = context(&server, &store);

        handle_login(
            &mut ctx,
            LoginArgs {
                username: Some("root".into()),
                password: Some("secret".into()),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;

        login.assert();
        assert_eq!(store.snapshot().as_deref(), Some("fresh"));
        assert_eq!(ctx.console.view().mode(), Mode::App);
        Ok(())
    }

    fn mock_token(server: &MockServer) {
        mock_json(
            server,
            POST,
            "/api/auth/login",
            json!({ "access_token": "fresh", "token_type": "bearer" }),
        );
    }

    #[tokio::test]
    async fn login_recovers_from_a_corrupt_session_file() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_token(&server);
        mock_json(&server, GET, "/api/users/me", admin_json());
        mock_json(&server, GET, "/api/documents/", json!([]));
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json")?;

        let api = ApiClient::new(server.base_url().parse()?, None, None)
            .map_err(|err| anyhow!(err.to_string()))?;
        let mut ctx = AppContext::new(
            api,
            Box::new(FileTokenStore::new(&path)),
            OutputFormat::Table,
            offset(),
            true,
        )
        .map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(ctx.console.session().token, None);

        handle_login(
            &mut ctx,
            LoginArgs {
                username: Some("root".into()),
                password: Some("secret".into()),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;

        assert_eq!(
            FileTokenStore::new(&path)
                .load()
                .map_err(|err| anyhow!(err.to_string()))?
                .as_deref(),
            Some("fresh")
        );
        Ok(())
    }

    #[tokio::test]
    async fn login_survives_a_failed_profile_fetch() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        mock_token(&server);
        server.mock(|when, then| {
            when.method(GET).path("/api/users/me");
            then.status(500)
                .header("content-type", "application/json")
                .json_body(json!({ "detail": "database unavailable" }));
        });
        mock_json(&server, GET, "/api/documents/", json!([]));
        let store = MemoryTokenStore::new();
        let mut ctx = context(&server, &store);

        handle_login(
            &mut ctx,
            LoginArgs {
                username: Some("root".into()),
                password: Some("secret".into()),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;

        assert_eq!(store.snapshot().as_deref(), Some("fresh"));
        assert_eq!(ctx.console.view().mode(), Mode::App);
        assert!(ctx.console.current_user().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn rejected_credentials_are_a_validation_error() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/auth/login");
            then.status(401)
                .header("content-type", "application/json")
                .json_body(json!({ "detail": "Incorrect username or password" }));
        });
        let store = MemoryTokenStore::new();
        let mut ctx = context(&server, &store);

        let err = handle_login(
            &mut ctx,
            LoginArgs {
                username: Some("root".into()),
                password: Some("wrong".into()),
            },
        )
        .await
        .expect_err("rejected");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.display_message(), "Invalid credentials");
        assert_eq!(store.snapshot(), None);
        Ok(())
    }

    #[tokio::test]
    async fn logout_clears_the_store() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;

        handle_logout(&mut ctx).map_err(|err| anyhow!(err.display_message()))?;
        assert_eq!(store.snapshot(), None);
        assert_eq!(ctx.console.view().mode(), Mode::Login);
        Ok(())
    }

    #[tokio::test]
    async fn password_change_puts_both_passwords() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        let change = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/users/me/password")
                .json_body(json!({ "current_password": "old", "new_password": "n3w" }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "message": "Password updated successfully" }));
        });

        handle_passwd(
            &mut ctx,
            PasswdArgs {
                current: Some("old".into()),
                new: Some("n3w".into()),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        change.assert();
        Ok(())
    }
}
