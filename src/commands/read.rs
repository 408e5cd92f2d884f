use super::Context;
use crate::cli::PageArgs;
use crate::twitter::{paginate, tweet_id_from_input};
use anyhow::Result;

pub async fn read(ctx: &Context, input: &str) -> Result<()> {
    let id = tweet_id_from_input(input)?;
    let client = ctx.client().await?;
    let tweet = client.get_tweet(&id).await?;
    if ctx.printer.json {
        return ctx.printer.print_json(&tweet);
    }
    ctx.printer.print_tweets(std::slice::from_ref(&tweet))
}

pub async fn replies(ctx: &Context, input: &str, page: &PageArgs) -> Result<()> {
    let id = tweet_id_from_input(input)?;
    let id = id.as_str();
    let client = ctx.client().await?;
    let client = &client;
    let request = page.request();
    let result = paginate(&request, |cursor| client.get_replies(id, cursor)).await?;
    ctx.printer.print_tweet_page(&result, request.is_paged())
}

pub async fn thread(ctx: &Context, input: &str) -> Result<()> {
    let id = tweet_id_from_input(input)?;
    let client = ctx.client().await?;
    let tweets = client.get_thread(&id).await?;
    ctx.printer.print_tweets(&tweets)
}

pub async fn search(ctx: &Context, query: &str, page: &PageArgs) -> Result<()> {
    let client = ctx.client().await?;
    let client = &client;
    let request = page.request();
    let page_size = request.count.min(100);
    let result = paginate(&request, |cursor| client.search(query, page_size, cursor)).await?;
    ctx.printer.print_tweet_page(&result, request.is_paged())
}

pub async fn mentions(ctx: &Context, handle: Option<&str>, page: &PageArgs) -> Result<()> {
    let client = ctx.client().await?;
    let handle = match handle {
        Some(handle) => handle.to_string(),
        None => client.get_current_user().await?.username,
    };
    let handle = handle.as_str();
    let client = &client;
    let request = page.request();
    let page_size = request.count.min(100);
    let result = paginate(&request, |cursor| {
        client.get_mentions(Some(handle), page_size, cursor)
    })
    .await?;
    ctx.printer.print_tweet_page(&result, request.is_paged())
}

pub async fn home(ctx: &Context, latest: bool, page: &PageArgs) -> Result<()> {
    let client = ctx.client().await?;
    let client = &client;
    let request = page.request();
    let page_size = request.count.min(100);
    let result = paginate(&request, |cursor| {
        client.get_home_timeline(latest, page_size, cursor)
    })
    .await?;
    ctx.printer.print_tweet_page(&result, request.is_paged())
}

pub async fn user_tweets(ctx: &Context, handle: &str, page: &PageArgs) -> Result<()> {
    let client = ctx.client().await?;
    let user_id = client.get_user_id(handle).await?;
    let user_id = user_id.as_str();
    let client = &client;
    let request = page.request();
    let page_size = request.count.min(100);
    let result = paginate(&request, |cursor| {
        client.get_user_tweets(user_id, page_size, cursor)
    })
    .await?;
    ctx.printer.print_tweet_page(&result, request.is_paged())
}

pub async fn bookmarks(ctx: &Context, page: &PageArgs) -> Result<()> {
    let client = ctx.client().await?;
    let client = &client;
    let request = page.request();
    let page_size = request.count.min(100);
    let result = paginate(&request, |cursor| client.get_bookmarks(page_size, cursor)).await?;
    ctx.printer.print_tweet_page(&result, request.is_paged())
}

pub async fn likes(ctx: &Context, handle: Option<&str>, page: &PageArgs) -> Result<()> {
    let client = ctx.client().await?;
    let user_id = match handle {
        Some(handle) => client.get_user_id(handle).await?,
        None => client.get_current_user().await?.id,
    };
    let user_id = user_id.as_str();
    let client = &client;
    let request = page.request();
    let page_size = request.count.min(100);
    let result = paginate(&request, |cursor| {
        client.get_likes(user_id, page_size, cursor)
    })
    .await?;
    ctx.printer.print_tweet_page(&result, request.is_paged())
}
