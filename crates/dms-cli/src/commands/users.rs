use dms_console::Tab;
use dms_console::console::USER_CREATED_MESSAGE;
use dms_console::forms::NewUserForm;

use crate::cli::{IdArgs, UserAddArgs};
use crate::client::{AppContext, CliResult, confirmer, prompt_secret};
use crate::output::{render_message, render_view};

pub(crate) async fn handle_list(ctx: &mut AppContext) -> CliResult<()> {
    let ticket = ctx.console.select_tab(Tab::Users)?;
    let view = ctx.load(ticket).await?;
    println!("{}", render_view(&view, ctx.output, ctx.offset)?);
    Ok(())
}

pub(crate) async fn handle_add(ctx: &mut AppContext, args: UserAddArgs) -> CliResult<()> {
    let password = match args.password {
        Some(password) => password,
        None => prompt_secret("Password for the new account: ", "--password")?,
    };
    let form = NewUserForm {
        username: args.username,
        email: args.email,
        password,
        role: args.role,
    };
    let created = ctx.console.create_user(&form).await?;
    tracing::debug!(user_id = created.value.id, "account registered");
    println!("{}", render_message(USER_CREATED_MESSAGE, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_set_active(
    ctx: &mut AppContext,
    args: IdArgs,
    active: bool,
) -> CliResult<()> {
    let updated = ctx.console.set_user_active(args.id, active).await?;
    let verb = if updated.value.is_active {
        "activated"
    } else {
        "deactivated"
    };
    let message = format!("User {} {verb}", updated.value.username);
    println!("{}", render_message(&message, ctx.output)?);
    Ok(())
}

pub(crate) async fn handle_remove(ctx: &mut AppContext, args: IdArgs) -> CliResult<()> {
    let mut confirm = confirmer(ctx.assume_yes);
    ctx.console.delete_user(args.id, &mut confirm).await?;
    println!("{}", render_message("User deleted", ctx.output)?);
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

    #[tokio::test]
    async fn add_registers_with_normalised_role() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        let register = server.mock(|when, then| {
            when.method(POST).path("/api/auth/register").json_body(json!({
                "username": "sam",
                "email": "sam@example.com",
                "password": "pw",
                "role": "admin"
            }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "id": 9,
                    "username": "sam",
                    "email": "sam@example.com",
                    "role": "admin",
                    "is_active": true,
                    "created_at": "2024-01-01T00:00:00"
                }));
        });

        handle_add(
            &mut ctx,
            UserAddArgs {
                username: "sam".into(),
                email: "sam@example.com".into(),
                password: Some("pw".into()),
                role: "Admin".into(),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        register.assert();
        Ok(())
    }

    #[tokio::test]
    async fn deactivate_sends_the_flag() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        let update = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/users/7")
                .json_body(json!({ "is_active": false }));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "id": 7,
                    "username": "clerk",
                    "email": "clerk@example.com",
                    "role": "user",
                    "is_active": false,
                    "created_at": "2024-01-01T00:00:00"
                }));
        });

        handle_set_active(&mut ctx, IdArgs { id: 7 }, false)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        update.assert();
        Ok(())
    }

    #[tokio::test]
    async fn own_account_cannot_be_deleted() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;

        let err = handle_remove(&mut ctx, IdArgs { id: 1 })
            .await
            .expect_err("self delete");
        assert_eq!(err.display_message(), "You cannot delete your own account");
        Ok(())
    }

    #[tokio::test]
    async fn list_renders_the_users_tab() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let store = MemoryTokenStore::with_token("tok");
        let mut ctx = resumed_context(&server, &store, admin_json()).await;
        let users = mock_json(&server, GET, "/api/users/", json!([admin_json()]));

        handle_list(&mut ctx)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;
        users.assert();
        assert_eq!(ctx.console.view().active(), Tab::Users);
        Ok(())
    }
}
