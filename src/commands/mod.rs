//! One async handler per subcommand.

mod account;
mod news;
mod post;
mod read;

use crate::cli::{Cli, Command, GlobalArgs};
use crate::config::Config;
use crate::credentials::{resolve_credentials, CredentialOptions, CredentialResolution};
use crate::output::Printer;
use crate::twitter::{self, ClientOptions, Endpoints, QueryIds, TwitterClient};
use anyhow::{bail, Context as _, Result};
use std::time::Duration;
use tracing::debug;

/// Settings shared by every command: merged config, global flags and the printer.
pub struct Context {
    pub config: Config,
    pub global: GlobalArgs,
    pub printer: Printer,
}

impl Context {
    pub fn new(global: GlobalArgs) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let config = Config::load(&cwd)?;
        let printer = Printer::new(global.json, global.plain, global.no_color);
        Ok(Self {
            config,
            global,
            printer,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.global.timeout.unwrap_or(self.config.timeout_ms))
    }

    fn credential_options(&self) -> CredentialOptions {
        let sources = if self.global.cookie_sources.is_empty() {
            self.config.cookie_sources.clone()
        } else {
            self.global.cookie_sources.clone()
        };
        CredentialOptions {
            auth_token: self.global.auth_token.clone(),
            ct0: self.global.ct0.clone(),
            sources,
            chrome_profile: self
                .global
                .chrome_profile
                .clone()
                .or_else(|| self.config.chrome_profile.clone()),
            firefox_profile: self
                .global
                .firefox_profile
                .clone()
                .or_else(|| self.config.firefox_profile.clone()),
        }
    }

    /// Cookie stores are read with blocking I/O (sqlite, keychain).
    pub async fn resolve(&self) -> Result<CredentialResolution> {
        let options = self.credential_options();
        tokio::task::spawn_blocking(move || resolve_credentials(&options))
            .await
            .context("Credential lookup task failed")
    }

    /// Resolve credentials and build a client, failing when a token is missing.
    pub async fn client(&self) -> Result<TwitterClient> {
        let resolution = self.resolve().await?;
        if !resolution.cookies.is_complete() {
            for warning in &resolution.warnings {
                self.printer.warning(warning);
            }
            self.printer
                .hint("pass --auth-token/--ct0, set AUTH_TOKEN/CT0, or log in to x.com in a supported browser");
            bail!("Missing credentials");
        }
        for warning in &resolution.warnings {
            debug!(%warning, "credential lookup");
        }
        if let Some(source) = &resolution.cookies.source {
            debug!(%source, "using session cookies");
        }

        let mut options = ClientOptions::new(resolution.cookies);
        options.timeout = self.timeout();
        options.quote_depth = self.global.quote_depth.unwrap_or(self.config.quote_depth);
        Ok(TwitterClient::new(options)?)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let ctx = Context::new(cli.global)?;

    match cli.command {
        Command::Tweet { text, media } => post::tweet(&ctx, &text, None, &media).await,
        Command::Reply { tweet, text, media } => {
            post::tweet(&ctx, &text, Some(&tweet), &media).await
        }
        Command::Read { tweet } => read::read(&ctx, &tweet).await,
        Command::Replies { tweet, page } => read::replies(&ctx, &tweet, &page).await,
        Command::Thread { tweet } => read::thread(&ctx, &tweet).await,
        Command::Search { query, page } => read::search(&ctx, &query, &page).await,
        Command::Mentions { user, page } => read::mentions(&ctx, user.as_deref(), &page).await,
        Command::Home { following, page } => read::home(&ctx, following, &page).await,
        Command::UserTweets { handle, page } => read::user_tweets(&ctx, &handle, &page).await,
        Command::Bookmarks { page } => read::bookmarks(&ctx, &page).await,
        Command::Unbookmark { tweets } => post::unbookmark(&ctx, &tweets).await,
        Command::Likes { handle, page } => read::likes(&ctx, handle.as_deref(), &page).await,
        Command::Following { handle, page } => {
            account::following(&ctx, handle.as_deref(), &page).await
        }
        Command::Followers { handle, page } => {
            account::followers(&ctx, handle.as_deref(), &page).await
        }
        Command::Follow { handle } => account::follow(&ctx, &handle, true).await,
        Command::Unfollow { handle } => account::follow(&ctx, &handle, false).await,
        Command::Whoami => account::whoami(&ctx).await,
        Command::Check => account::check(&ctx).await,
        Command::QueryIds { fresh } => query_ids(&ctx, fresh).await,
        Command::News(args) => news::news(&ctx, &args).await,
        Command::Serve { port, open } => news::serve(&ctx, port, open).await,
    }
}

/// Works without credentials; the x.com pages and bundles are public.
async fn query_ids(ctx: &Context, fresh: bool) -> Result<()> {
    let ids = QueryIds::load(QueryIds::default_path());

    if fresh {
        let http = twitter::http_client(ctx.timeout()).context("Failed to build HTTP client")?;
        let cache = twitter::query_ids::refresh(&http, &Endpoints::default().discovery_pages)
            .await
            .context("Failed to refresh query ids")?;
        ids.replace(cache)?;
    }

    let cache = ids.snapshot();
    if ctx.printer.json {
        return ctx.printer.print_json(&cache);
    }

    match (&cache, ids.path()) {
        (Some(cache), path) => {
            let state = if cache.is_fresh(chrono::Utc::now()) {
                "fresh"
            } else {
                "stale"
            };
            println!(
                "Fetched {} ({})",
                cache.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"),
                state
            );
            if let Some(path) = path {
                println!("Cache: {}", path.display());
            }
        }
        (None, _) => println!("No cached query ids; using built-in fallbacks."),
    }
    for op in crate::twitter::Operation::ALL {
        let cached = cache.as_ref().and_then(|c| c.ids.get(op.name()));
        match cached {
            Some(id) => println!("  {:<22} {}", op.name(), id),
            None => println!("  {:<22} {} (fallback)", op.name(), op.fallback_id()),
        }
    }
    Ok(())
}
