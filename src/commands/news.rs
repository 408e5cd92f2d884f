use super::Context;
use crate::cli::NewsArgs;
use crate::twitter::NewsOptions;
use anyhow::Result;
use std::sync::Arc;

pub async fn news(ctx: &Context, args: &NewsArgs) -> Result<()> {
    let client = ctx.client().await?;
    let options = NewsOptions {
        count: args.count,
        tabs: args.tabs.clone(),
        with_tweets: args.with_tweets,
        tweets_per_item: args.tweets_per_item,
    };
    let items = client.get_news(&options).await?;
    ctx.printer.print_news(&items)
}

/// Credentials are resolved once here; the server never starts without them.
pub async fn serve(ctx: &Context, port: Option<u16>, open: bool) -> Result<()> {
    let client = ctx.client().await?;
    let port = port.unwrap_or(ctx.config.server_port);
    crate::server::serve(Arc::new(client), port, open).await
}
