use super::Context;
use crate::cli::PageArgs;
use crate::twitter::{normalize_handle, paginate, TwitterClient};
use anyhow::{bail, Result};
use serde_json::json;

async fn resolve_user_id(client: &TwitterClient, handle: Option<&str>) -> Result<String> {
    Ok(match handle {
        Some(handle) => client.get_user_id(handle).await?,
        None => client.get_current_user().await?.id,
    })
}

pub async fn following(ctx: &Context, handle: Option<&str>, page: &PageArgs) -> Result<()> {
    let client = ctx.client().await?;
    let user_id = resolve_user_id(&client, handle).await?;
    let user_id = user_id.as_str();
    let client = &client;
    let request = page.request();
    let page_size = request.count.min(100);
    let result = paginate(&request, |cursor| {
        client.get_following(user_id, page_size, cursor)
    })
    .await?;
    ctx.printer.print_user_page(&result, request.is_paged())
}

pub async fn followers(ctx: &Context, handle: Option<&str>, page: &PageArgs) -> Result<()> {
    let client = ctx.client().await?;
    let user_id = resolve_user_id(&client, handle).await?;
    let user_id = user_id.as_str();
    let client = &client;
    let request = page.request();
    let page_size = request.count.min(100);
    let result = paginate(&request, |cursor| {
        client.get_followers(user_id, page_size, cursor)
    })
    .await?;
    ctx.printer.print_user_page(&result, request.is_paged())
}

pub async fn follow(ctx: &Context, handle: &str, follow: bool) -> Result<()> {
    let handle = normalize_handle(handle);
    let client = ctx.client().await?;
    let user_id = client.get_user_id(&handle).await?;
    if follow {
        client.follow(&user_id).await?;
    } else {
        client.unfollow(&user_id).await?;
    }

    if ctx.printer.json {
        return ctx.printer.print_json(&json!({
            "userId": user_id,
            "username": handle,
            "following": follow
        }));
    }
    let verb = if follow { "Followed" } else { "Unfollowed" };
    ctx.printer.success(&format!("{} @{}", verb, handle));
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<()> {
    let client = ctx.client().await?;
    let user = client.get_current_user().await?;
    if ctx.printer.json {
        return ctx.printer.print_json(&user);
    }
    ctx.printer.print_users(std::slice::from_ref(&user))
}

fn mask(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{}…({} chars)", visible, token.chars().count())
}

/// Report which tokens were found and where; fails when either is missing.
pub async fn check(ctx: &Context) -> Result<()> {
    let resolution = ctx.resolve().await?;
    let cookies = &resolution.cookies;

    if ctx.printer.json {
        ctx.printer.print_json(&json!({
            "ok": cookies.is_complete(),
            "source": cookies.source,
            "authToken": cookies.auth_token.is_some(),
            "ct0": cookies.ct0.is_some(),
            "warnings": resolution.warnings,
        }))?;
    } else {
        let show = |name: &str, value: &Option<String>| match value {
            Some(token) => println!("{:<11} {}", name, mask(token)),
            None => println!("{:<11} missing", name),
        };
        show("auth_token", &cookies.auth_token);
        show("ct0", &cookies.ct0);
        if let Some(source) = &cookies.source {
            println!("{:<11} {}", "source", source);
        }
        for warning in &resolution.warnings {
            ctx.printer.warning(warning);
        }
    }

    if !cookies.is_complete() {
        bail!("Missing credentials");
    }
    if !ctx.printer.json {
        ctx.printer.success("Credentials found");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_hides_most_of_token() {
        assert_eq!(mask("abcdef0123456789"), "abcd…(16 chars)");
        assert_eq!(mask("ab"), "ab…(2 chars)");
    }
}
