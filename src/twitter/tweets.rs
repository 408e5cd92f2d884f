use super::features::{timeline_features, tweet_detail_field_toggles};
use super::parse::{bottom_cursor, instructions_any, instructions_at, parse_timeline_tweets};
use super::query_ids::Operation;
use super::types::{Page, Tweet};
use super::TwitterClient;
use crate::error::{Result, TwitterError};
use serde_json::{json, Value};

const TWEET_DETAIL_PATH: &str = "/data/threaded_conversation_with_injections_v2/instructions";
const USER_TIMELINE_PATHS: [&str; 2] = [
    "/data/user/result/timeline/timeline/instructions",
    "/data/user/result/timeline_v2/timeline/instructions",
];

fn with_cursor(mut variables: Value, cursor: Option<&str>) -> Value {
    if let Some(cursor) = cursor {
        variables["cursor"] = json!(cursor);
    }
    variables
}

fn without_focal(tweets: Vec<Tweet>, focal: &str) -> Vec<Tweet> {
    tweets.into_iter().filter(|t| t.id != focal).collect()
}

fn thread_of(tweets: Vec<Tweet>, focal_id: &str) -> Result<Vec<Tweet>> {
    let focal = tweets
        .iter()
        .find(|t| t.id == focal_id)
        .cloned()
        .ok_or_else(|| TwitterError::Parse(format!("tweet {} not found in response", focal_id)))?;
    let conversation = focal.conversation_id.clone().unwrap_or_else(|| focal.id.clone());

    let mut thread: Vec<Tweet> = tweets
        .into_iter()
        .filter(|t| {
            t.author.username == focal.author.username
                && t.conversation_id.as_deref().unwrap_or(&t.id) == conversation
        })
        .collect();
    thread.sort_by(|a, b| id_order(&a.id, &b.id));
    thread.dedup_by(|a, b| a.id == b.id);
    Ok(thread)
}

/// Numeric ordering for snowflake ids held as strings.
fn id_order(a: &str, b: &str) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

impl TwitterClient {
    async fn tweet_detail(&self, id: &str, cursor: Option<&str>) -> Result<(Vec<Tweet>, Option<String>)> {
        let variables = with_cursor(
            json!({
                "focalTweetId": id,
                "with_rux_injections": false,
                "rankingMode": "Relevance",
                "includePromotedContent": false,
                "withCommunity": true,
                "withQuickPromoteEligibilityTweetFields": true,
                "withBirdwatchNotes": true,
                "withVoice": true
            }),
            cursor,
        );
        let body = self
            .graphql_get(
                Operation::TweetDetail,
                variables,
                timeline_features(),
                Some(tweet_detail_field_toggles()),
            )
            .await?;
        let instructions = instructions_at(&body, TWEET_DETAIL_PATH);
        Ok((
            parse_timeline_tweets(instructions, self.quote_depth()),
            bottom_cursor(instructions),
        ))
    }

    pub async fn get_tweet(&self, id: &str) -> Result<Tweet> {
        let (tweets, _) = self.tweet_detail(id, None).await?;
        tweets
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| TwitterError::Parse(format!("tweet {} not found in response", id)))
    }

    /// The conversation around `id`, minus the focal tweet itself.
    pub async fn get_replies(&self, id: &str, cursor: Option<String>) -> Result<Page<Tweet>> {
        let (tweets, next) = self.tweet_detail(id, cursor.as_deref()).await?;
        Ok(Page::new(without_focal(tweets, id), next))
    }

    /// The focal tweet plus the author's own replies in the same conversation.
    pub async fn get_thread(&self, id: &str) -> Result<Vec<Tweet>> {
        let (tweets, _) = self.tweet_detail(id, None).await?;
        thread_of(tweets, id)
    }

    pub async fn search(&self, query: &str, count: usize, cursor: Option<String>) -> Result<Page<Tweet>> {
        let variables = with_cursor(
            json!({
                "rawQuery": query,
                "count": count,
                "querySource": "typed_query",
                "product": "Latest"
            }),
            cursor.as_deref(),
        );
        let body = self
            .graphql_get(Operation::SearchTimeline, variables, timeline_features(), None)
            .await?;
        let instructions = instructions_at(
            &body,
            "/data/search_by_raw_query/search_timeline/timeline/instructions",
        );
        Ok(Page::new(
            parse_timeline_tweets(instructions, self.quote_depth()),
            bottom_cursor(instructions),
        ))
    }

    /// Mentions of `handle`, or of the logged-in account.
    pub async fn get_mentions(&self, handle: Option<&str>, count: usize, cursor: Option<String>) -> Result<Page<Tweet>> {
        let handle = match handle {
            Some(h) => super::normalize_handle(h),
            None => self.get_current_user().await?.username,
        };
        self.search(&format!("@{}", handle), count, cursor).await
    }

    pub async fn get_home_timeline(&self, latest: bool, count: usize, cursor: Option<String>) -> Result<Page<Tweet>> {
        let op = if latest {
            Operation::HomeLatestTimeline
        } else {
            Operation::HomeTimeline
        };
        let variables = with_cursor(
            json!({
                "count": count,
                "includePromotedContent": false,
                "latestControlAvailable": true,
                "requestContext": "launch",
                "withCommunity": true
            }),
            cursor.as_deref(),
        );
        let body = self
            .graphql_get(op, variables, timeline_features(), None)
            .await?;
        let instructions = instructions_at(&body, "/data/home/home_timeline_urt/instructions");
        Ok(Page::new(
            parse_timeline_tweets(instructions, self.quote_depth()),
            bottom_cursor(instructions),
        ))
    }

    pub async fn get_bookmarks(&self, count: usize, cursor: Option<String>) -> Result<Page<Tweet>> {
        let variables = with_cursor(
            json!({ "count": count, "includePromotedContent": false }),
            cursor.as_deref(),
        );
        let body = self
            .graphql_get(Operation::Bookmarks, variables, timeline_features(), None)
            .await?;
        let instructions = instructions_at(&body, "/data/bookmark_timeline_v2/timeline/instructions");
        Ok(Page::new(
            parse_timeline_tweets(instructions, self.quote_depth()),
            bottom_cursor(instructions),
        ))
    }

    pub async fn unbookmark(&self, id: &str) -> Result<()> {
        let body = self
            .graphql_post(
                Operation::DeleteBookmark,
                json!({ "tweet_id": id }),
                json!({}),
            )
            .await?;
        match body.pointer("/data/tweet_bookmark_delete").and_then(Value::as_str) {
            Some("Done") => Ok(()),
            _ => Err(TwitterError::Parse(format!(
                "bookmark removal for {} was not confirmed",
                id
            ))),
        }
    }

    pub async fn get_likes(&self, user_id: &str, count: usize, cursor: Option<String>) -> Result<Page<Tweet>> {
        let variables = with_cursor(
            json!({
                "userId": user_id,
                "count": count,
                "includePromotedContent": false,
                "withClientEventToken": false,
                "withBirdwatchNotes": false,
                "withVoice": true
            }),
            cursor.as_deref(),
        );
        let body = self
            .graphql_get(Operation::Likes, variables, timeline_features(), None)
            .await?;
        let instructions = instructions_any(&body, &USER_TIMELINE_PATHS);
        Ok(Page::new(
            parse_timeline_tweets(instructions, self.quote_depth()),
            bottom_cursor(instructions),
        ))
    }

    pub async fn get_user_tweets(&self, user_id: &str, count: usize, cursor: Option<String>) -> Result<Page<Tweet>> {
        let variables = with_cursor(
            json!({
                "userId": user_id,
                "count": count,
                "includePromotedContent": false,
                "withQuickPromoteEligibilityTweetFields": true,
                "withVoice": true
            }),
            cursor.as_deref(),
        );
        let body = self
            .graphql_get(Operation::UserTweets, variables, timeline_features(), None)
            .await?;
        let instructions = instructions_any(&body, &USER_TIMELINE_PATHS);
        Ok(Page::new(
            parse_timeline_tweets(instructions, self.quote_depth()),
            bottom_cursor(instructions),
        ))
    }
}
