//! GraphQL query ids: built-in fallbacks plus an on-disk memo refreshed by
//! scraping the x.com client bundles.

use crate::error::{Result, TwitterError};
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info, warn};

pub const CACHE_FILE: &str = "query-ids-cache.json";
pub const DEFAULT_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Pages whose HTML references the bundles that define every operation we use.
pub const DISCOVERY_PAGES: [&str; 4] = [
    "https://x.com/?lang=en",
    "https://x.com/explore",
    "https://x.com/notifications",
    "https://x.com/settings/profile",
];

const BUNDLE_MARKER: &str = "/responsive-web/client-web";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    TweetDetail,
    SearchTimeline,
    UserByScreenName,
    UserTweets,
    Following,
    Followers,
    Likes,
    Bookmarks,
    DeleteBookmark,
    HomeTimeline,
    HomeLatestTimeline,
    CreateTweet,
    GenericTimelineById,
}

impl Operation {
    pub const ALL: [Operation; 13] = [
        Operation::TweetDetail,
        Operation::SearchTimeline,
        Operation::UserByScreenName,
        Operation::UserTweets,
        Operation::Following,
        Operation::Followers,
        Operation::Likes,
        Operation::Bookmarks,
        Operation::DeleteBookmark,
        Operation::HomeTimeline,
        Operation::HomeLatestTimeline,
        Operation::CreateTweet,
        Operation::GenericTimelineById,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::TweetDetail => "TweetDetail",
            Operation::SearchTimeline => "SearchTimeline",
            Operation::UserByScreenName => "UserByScreenName",
            Operation::UserTweets => "UserTweets",
            Operation::Following => "Following",
            Operation::Followers => "Followers",
            Operation::Likes => "Likes",
            Operation::Bookmarks => "Bookmarks",
            Operation::DeleteBookmark => "DeleteBookmark",
            Operation::HomeTimeline => "HomeTimeline",
            Operation::HomeLatestTimeline => "HomeLatestTimeline",
            Operation::CreateTweet => "CreateTweet",
            Operation::GenericTimelineById => "GenericTimelineById",
        }
    }

    /// Ids known to work when the cache is empty or stale.
    pub fn fallback_id(&self) -> &'static str {
        match self {
            Operation::TweetDetail => "97JF30KziU00483E_8elBA",
            Operation::SearchTimeline => "M1jEez78PEfVfbQLvlWMvQ",
            Operation::UserByScreenName => "xc8f1g7BYqr6VTzTbvNlGw",
            Operation::UserTweets => "Y9WM4Id6UcGFE8Z-hbnixw",
            Operation::Following => "BEkNpEt5pNETESoqMsTEGA",
            Operation::Followers => "kuFUYP9eV1FPoEy4N-pi7w",
            Operation::Likes => "JR2gceKucIKcVNB_9JkhsA",
            Operation::Bookmarks => "RV1g3b8n_SGOHwkqKYSCFw",
            Operation::DeleteBookmark => "Wlmlj2-xzyS1GN3a6cj-mQ",
            Operation::HomeTimeline => "HJFjzBgCs16TqxewQOeLNg",
            Operation::HomeLatestTimeline => "DiTkXJgLqBBxCs7zaYsbtA",
            Operation::CreateTweet => "znq7jUAqRjmPj7IszLem5Q",
            Operation::GenericTimelineById => "LZfAdxTdNolKXw6ZkoY_kA",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Discovery {
    pub pages: Vec<String>,
    pub bundles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryIdCache {
    pub fetched_at: DateTime<Utc>,
    pub ttl_ms: u64,
    pub ids: BTreeMap<String, String>,
    #[serde(default)]
    pub discovery: Discovery,
}

impl QueryIdCache {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < Duration::milliseconds(self.ttl_ms as i64)
    }

    pub fn read(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable query id cache");
                None
            }
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Query id lookup shared by every request of a client.
pub struct QueryIds {
    path: Option<PathBuf>,
    cache: RwLock<Option<QueryIdCache>>,
}

impl QueryIds {
    pub fn default_path() -> Option<PathBuf> {
        crate::config::config_dir().map(|dir| dir.join(CACHE_FILE))
    }

    pub fn load(path: Option<PathBuf>) -> Self {
        let cache = path.as_deref().and_then(QueryIdCache::read);
        Self {
            path,
            cache: RwLock::new(cache),
        }
    }

    /// No disk memo; fallbacks only until a refresh happens.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, op: Operation) -> String {
        let now = Utc::now();
        let cached = self.cache.read().ok().and_then(|guard| {
            guard
                .as_ref()
                .filter(|c| c.is_fresh(now))
                .and_then(|c| c.ids.get(op.name()).cloned())
        });
        cached.unwrap_or_else(|| op.fallback_id().to_string())
    }

    pub fn snapshot(&self) -> Option<QueryIdCache> {
        self.cache.read().ok().and_then(|guard| guard.clone())
    }

    /// Install a freshly scraped cache and persist it when a path is configured.
    pub fn replace(&self, cache: QueryIdCache) -> Result<()> {
        if let Some(path) = &self.path {
            cache.write(path)?;
        }
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(cache);
        }
        Ok(())
    }
}

/// Scrape the web client for current `queryId`/`operationName` pairs.
pub async fn refresh(http: &reqwest::Client, discovery_pages: &[String]) -> Result<QueryIdCache> {
    let mut bundles = BTreeSet::new();
    let mut pages = Vec::new();

    for page in discovery_pages {
        match fetch_text(http, page).await {
            Ok(html) => {
                pages.push(page.to_string());
                bundles.extend(extract_bundle_urls(&html));
            }
            Err(e) => warn!(%page, error = %e, "failed to fetch discovery page"),
        }
    }

    if bundles.is_empty() {
        return Err(TwitterError::Parse(
            "no client bundles found on x.com pages".to_string(),
        ));
    }
    debug!(count = bundles.len(), "discovered client bundles");

    let client = http.clone();
    let results: Vec<(String, Option<String>)> = stream::iter(bundles.iter().cloned().map(move |url| {
        let client = client.clone();
        async move {
            let body = fetch_text(&client, &url).await.ok();
            (url, body)
        }
    }))
    .buffer_unordered(6)
    .collect()
    .await;

    let mut ids = BTreeMap::new();
    let mut used_bundles = Vec::new();
    for (url, body) in results {
        let Some(body) = body else { continue };
        let found = extract_query_ids(&body);
        if !found.is_empty() {
            used_bundles.push(url);
        }
        ids.extend(found);
    }

    if ids.is_empty() {
        return Err(TwitterError::Parse(
            "client bundles did not contain any query ids".to_string(),
        ));
    }
    used_bundles.sort();
    info!(operations = ids.len(), "refreshed GraphQL query ids");

    Ok(QueryIdCache {
        fetched_at: Utc::now(),
        ttl_ms: DEFAULT_TTL_MS,
        ids,
        discovery: Discovery {
            pages,
            bundles: used_bundles,
        },
    })
}

async fn fetch_text(http: &reqwest::Client, url: &str) -> Result<String> {
    let response = http.get(url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(TwitterError::status(status.as_u16(), &body));
    }
    Ok(body)
}

/// Client bundle URLs referenced from `<script src>` and `<link href>` tags.
pub fn extract_bundle_urls(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut urls = Vec::new();

    for (selector, attr) in [("script[src]", "src"), ("link[href]", "href")] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        for element in document.select(&selector) {
            if let Some(url) = element.value().attr(attr) {
                if url.contains(BUNDLE_MARKER) && url.ends_with(".js") && !urls.iter().any(|u| u == url) {
                    urls.push(url.to_string());
                }
            }
        }
    }
    urls
}

fn quoted_after<'a>(text: &'a str, key: &str) -> Option<(&'a str, usize)> {
    let start = text.find(key)? + key.len();
    let rest = &text[start..];
    let end = rest.find('"')?;
    Some((&rest[..end], start + end))
}

/// Pull `queryId:"…",operationName:"…"` pairs out of minified JavaScript.
pub fn extract_query_ids(js: &str) -> BTreeMap<String, String> {
    let mut ids = BTreeMap::new();
    let mut rest = js;

    while let Some((id, consumed)) = quoted_after(rest, "queryId:\"") {
        rest = &rest[consumed..];
        // operationName follows within the same object literal
        let window_end = rest
            .char_indices()
            .nth(120)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if let Some((name, _)) = quoted_after(&rest[..window_end], "operationName:\"") {
            if !id.is_empty() && !name.is_empty() {
                ids.insert(name.to_string(), id.to_string());
            }
        }
    }
    ids
}
