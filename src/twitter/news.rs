//! Explore-tab news aggregation.

use super::features::timeline_features;
use super::parse::{instructions_any, parse_news_entries};
use super::query_ids::Operation;
use super::types::NewsItem;
use super::TwitterClient;
use crate::error::{Result, TwitterError};
use async_trait::async_trait;
use base64::Engine;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEFAULT_NEWS_COUNT: usize = 10;
pub const DEFAULT_TWEETS_PER_ITEM: usize = 3;
const TAB_PAGE_SIZE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NewsTab {
    ForYou,
    Trending,
    News,
    Sports,
    Entertainment,
}

impl NewsTab {
    pub const ALL: [NewsTab; 5] = [
        NewsTab::ForYou,
        NewsTab::Trending,
        NewsTab::News,
        NewsTab::Sports,
        NewsTab::Entertainment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NewsTab::ForYou => "for_you",
            NewsTab::Trending => "trending",
            NewsTab::News => "news",
            NewsTab::Sports => "sports",
            NewsTab::Entertainment => "entertainment",
        }
    }

    /// `Timeline:` followed by a thrift struct holding the tab name, base64 encoded.
    pub fn timeline_id(&self) -> String {
        let name = self.name().as_bytes();
        let mut raw = b"Timeline:".to_vec();
        raw.extend_from_slice(&[0x0c, 0x00, 0xb6, 0x0b, 0x00, 0x01]);
        raw.extend_from_slice(&(name.len() as u32).to_be_bytes());
        raw.extend_from_slice(name);
        raw.extend_from_slice(&[0x00, 0x00]);
        base64::engine::general_purpose::STANDARD.encode(raw)
    }
}

impl fmt::Display for NewsTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NewsTab {
    type Err = TwitterError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        NewsTab::ALL
            .into_iter()
            .find(|tab| tab.name() == wanted)
            .ok_or_else(|| TwitterError::InvalidInput(format!("unknown news tab: {}", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsOptions {
    pub count: usize,
    pub tabs: Vec<NewsTab>,
    pub with_tweets: bool,
    pub tweets_per_item: usize,
}

impl Default for NewsOptions {
    fn default() -> Self {
        Self {
            count: DEFAULT_NEWS_COUNT,
            tabs: NewsTab::ALL.to_vec(),
            with_tweets: false,
            tweets_per_item: DEFAULT_TWEETS_PER_ITEM,
        }
    }
}

/// Anything that can produce the aggregated news list.
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch_news(&self, options: &NewsOptions) -> Result<Vec<NewsItem>>;
}

#[async_trait]
impl NewsSource for TwitterClient {
    async fn fetch_news(&self, options: &NewsOptions) -> Result<Vec<NewsItem>> {
        self.get_news(options).await
    }
}

/// Headlines compare trimmed and case-insensitively.
fn headline_key(headline: &str) -> String {
    headline.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Keep the first item for each headline, preserving order.
pub fn dedupe_by_headline(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(headline_key(&item.headline)))
        .collect()
}

/// Combine per-tab results in tab order. Failed tabs are skipped; if every
/// tab failed the first error is returned.
pub fn merge_tabs(results: Vec<(NewsTab, Result<Vec<NewsItem>>)>, count: usize) -> Result<Vec<NewsItem>> {
    let mut first_error = None;
    let mut succeeded = 0;
    let mut items = Vec::new();

    for (tab, result) in results {
        match result {
            Ok(tab_items) => {
                debug!(tab = tab.name(), count = tab_items.len(), "explore tab loaded");
                succeeded += 1;
                items.extend(tab_items);
            }
            Err(e) => {
                warn!(tab = tab.name(), error = %e, "explore tab failed");
                first_error.get_or_insert(e);
            }
        }
    }

    if succeeded == 0 {
        if let Some(err) = first_error {
            return Err(err);
        }
    }

    let mut items = dedupe_by_headline(items);
    items.truncate(count);
    Ok(items)
}

impl TwitterClient {
    pub async fn get_explore_tab(&self, tab: NewsTab) -> Result<Vec<NewsItem>> {
        let body = self
            .graphql_get(
                Operation::GenericTimelineById,
                json!({
                    "timelineId": tab.timeline_id(),
                    "count": TAB_PAGE_SIZE,
                    "withQuickPromoteEligibilityTweetFields": true
                }),
                timeline_features(),
                None,
            )
            .await?;
        let instructions = instructions_any(
            &body,
            &[
                "/data/timeline/timeline/instructions",
                "/data/timeline/timeline_v2/timeline/instructions",
            ],
        );
        Ok(parse_news_entries(instructions, tab.name()))
    }

    /// Fan out across the selected Explore tabs, dedupe by headline and
    /// optionally attach a few matching tweets to each item.
    pub async fn get_news(&self, options: &NewsOptions) -> Result<Vec<NewsItem>> {
        if options.count == 0 {
            return Err(TwitterError::InvalidInput("count must be at least 1".to_string()));
        }
        let tabs = if options.tabs.is_empty() {
            NewsTab::ALL.to_vec()
        } else {
            options.tabs.clone()
        };

        let fetched = join_all(tabs.iter().map(|tab| self.get_explore_tab(*tab))).await;
        let mut items = merge_tabs(tabs.into_iter().zip(fetched).collect(), options.count)?;

        if options.with_tweets && options.tweets_per_item > 0 {
            self.attach_related_tweets(&mut items, options.tweets_per_item)
                .await;
        }
        Ok(items)
    }

    async fn attach_related_tweets(&self, items: &mut [NewsItem], per_item: usize) {
        let searches = items
            .iter()
            .map(|item| self.search(&item.headline, per_item, None));
        let results = join_all(searches).await;

        for (item, result) in items.iter_mut().zip(results) {
            match result {
                Ok(page) => {
                    let mut tweets = page.items;
                    tweets.truncate(per_item);
                    item.tweets = Some(tweets);
                }
                Err(e) => warn!(headline = %item.headline, error = %e, "related tweet search failed"),
            }
        }
    }
}
