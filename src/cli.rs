use crate::credentials::CookieSource;
use crate::twitter::news::{DEFAULT_NEWS_COUNT, DEFAULT_TWEETS_PER_ITEM};
use crate::twitter::{NewsTab, PageRequest};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const DEFAULT_PAGE_COUNT: usize = 20;

#[derive(Parser, Debug)]
#[command(name = "bird")]
#[command(about = "Read and post on X/Twitter from the terminal using your browser session")]
#[command(version, propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// auth_token cookie (overrides env and browser cookies)
    #[arg(long, global = true, value_name = "TOKEN")]
    pub auth_token: Option<String>,

    /// ct0 cookie (overrides env and browser cookies)
    #[arg(long, global = true, value_name = "TOKEN")]
    pub ct0: Option<String>,

    /// Browser cookie store to try, in order (repeatable)
    #[arg(long = "cookie-source", global = true, value_enum)]
    pub cookie_sources: Vec<CookieSource>,

    /// Chrome profile directory name (e.g. "Profile 1")
    #[arg(long, global = true)]
    pub chrome_profile: Option<String>,

    /// Firefox profile name or substring
    #[arg(long, global = true)]
    pub firefox_profile: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub timeout: Option<u64>,

    /// How many levels of quoted tweets to expand
    #[arg(long, global = true)]
    pub quote_depth: Option<usize>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Plain text: no emoji, no color
    #[arg(long, global = true)]
    pub plain: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    /// Number of items to fetch
    #[arg(short = 'n', long, default_value_t = DEFAULT_PAGE_COUNT)]
    pub count: usize,

    /// Keep following cursors until the timeline runs out
    #[arg(long)]
    pub all: bool,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Resume from a cursor printed by an earlier call
    #[arg(long)]
    pub cursor: Option<String>,
}

impl PageArgs {
    pub fn request(&self) -> PageRequest {
        PageRequest {
            count: self.count,
            all: self.all,
            max_pages: self.max_pages,
            cursor: self.cursor.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Post a new tweet
    Tweet {
        text: String,

        /// Attach an image, GIF or video (up to 4)
        #[arg(long = "media", value_name = "PATH")]
        media: Vec<PathBuf>,
    },

    /// Reply to a tweet
    Reply {
        /// Tweet id or URL
        tweet: String,

        text: String,

        #[arg(long = "media", value_name = "PATH")]
        media: Vec<PathBuf>,
    },

    /// Show a single tweet
    Read {
        /// Tweet id or URL
        tweet: String,
    },

    /// List replies to a tweet
    Replies {
        tweet: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Show the author's thread a tweet belongs to
    Thread { tweet: String },

    /// Search recent tweets
    Search {
        query: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Tweets mentioning you (or another account)
    Mentions {
        /// Handle to look up instead of the logged-in account
        #[arg(short, long)]
        user: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Your home timeline
    Home {
        /// Chronological "Following" timeline instead of "For you"
        #[arg(long)]
        following: bool,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Tweets posted by an account
    UserTweets {
        handle: String,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Your bookmarks
    Bookmarks {
        #[command(flatten)]
        page: PageArgs,
    },

    /// Remove bookmarks
    Unbookmark {
        /// Tweet ids or URLs
        #[arg(required = true)]
        tweets: Vec<String>,
    },

    /// Tweets liked by you (or another account)
    Likes {
        handle: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Accounts you (or another account) follow
    Following {
        handle: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Accounts following you (or another account)
    Followers {
        handle: Option<String>,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Follow an account
    Follow { handle: String },

    /// Unfollow an account
    Unfollow { handle: String },

    /// Show the logged-in account
    Whoami,

    /// Report where credentials come from
    Check,

    /// Show cached GraphQL query ids
    QueryIds {
        /// Scrape x.com for current ids and update the cache
        #[arg(long)]
        fresh: bool,
    },

    /// Aggregated headlines from the Explore tabs
    News(NewsArgs),

    /// Serve the news page locally
    Serve {
        /// Port to listen on (defaults to config server_port or 3000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Open the page in the default browser
        #[arg(long)]
        open: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct NewsArgs {
    /// Number of headlines
    #[arg(short = 'n', long, default_value_t = DEFAULT_NEWS_COUNT)]
    pub count: usize,

    /// Explore tabs to read (repeatable, default all)
    #[arg(long = "tab", value_enum)]
    pub tabs: Vec<NewsTab>,

    /// Attach matching tweets to each headline
    #[arg(long)]
    pub with_tweets: bool,

    #[arg(long, default_value_t = DEFAULT_TWEETS_PER_ITEM)]
    pub tweets_per_item: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&[
            "bird",
            "search",
            "rust lang",
            "--json",
            "--cookie-source",
            "firefox",
            "--cookie-source",
            "chrome",
            "-n",
            "5",
        ]);
        assert!(cli.global.json);
        assert_eq!(
            cli.global.cookie_sources,
            vec![CookieSource::Firefox, CookieSource::Chrome]
        );
        match cli.command {
            Command::Search { query, page } => {
                assert_eq!(query, "rust lang");
                assert_eq!(page.request(), PageRequest::first(5));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_paging_flags() {
        let cli = parse(&["bird", "bookmarks", "--all", "--max-pages", "3", "--cursor", "c1"]);
        let Command::Bookmarks { page } = cli.command else {
            panic!("expected bookmarks");
        };
        let request = page.request();
        assert!(request.all);
        assert_eq!(request.max_pages, Some(3));
        assert_eq!(request.cursor.as_deref(), Some("c1"));
        assert!(request.is_paged());
    }

    #[test]
    fn test_news_defaults_and_tabs() {
        let cli = parse(&["bird", "news"]);
        let Command::News(args) = cli.command else {
            panic!("expected news");
        };
        assert_eq!(args.count, 10);
        assert!(args.tabs.is_empty());
        assert_eq!(args.tweets_per_item, 3);

        let cli = parse(&["bird", "news", "--tab", "for-you", "--tab", "sports"]);
        let Command::News(args) = cli.command else {
            panic!("expected news");
        };
        assert_eq!(args.tabs, vec![NewsTab::ForYou, NewsTab::Sports]);
    }

    #[test]
    fn test_unbookmark_requires_ids() {
        assert!(Cli::try_parse_from(["bird", "unbookmark"]).is_err());
    }

    #[test]
    fn test_unknown_cookie_source_rejected() {
        assert!(Cli::try_parse_from(["bird", "check", "--cookie-source", "edge"]).is_err());
    }
}
