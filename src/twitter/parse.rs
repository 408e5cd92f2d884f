//! Normalization of GraphQL timeline responses into flat records.

use super::types::{MediaKind, NewsItem, Tweet, TweetArticle, TweetAuthor, TweetMedia, TwitterUser};
use crate::error::TwitterError;
use serde_json::Value;

/// Timeline entry with its id, either top level or inside a module.
struct Entry<'a> {
    id: &'a str,
    item_content: Option<&'a Value>,
    content: &'a Value,
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    str_at(value, pointer)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn count_at(value: &Value, pointer: &str) -> u64 {
    match value.pointer(pointer) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn first_string(value: &Value, pointers: &[&str]) -> Option<String> {
    pointers.iter().find_map(|p| string_at(value, p))
}

/// Flatten `TimelineAddEntries`, `TimelineReplaceEntry`, `TimelinePinEntry` and
/// `TimelineAddToModule` instructions into entries, expanding module items.
fn entries(instructions: &[Value]) -> Vec<Entry<'_>> {
    let mut out = Vec::new();

    fn add<'a>(entry: &'a Value, out: &mut Vec<Entry<'a>>) {
        let id = str_at(entry, "/entryId").unwrap_or("");
        let content = &entry["content"];
        if let Some(items) = content.get("items").and_then(Value::as_array) {
            for item in items {
                let item_id = str_at(item, "/entryId").unwrap_or(id);
                out.push(Entry {
                    id: item_id,
                    item_content: item.pointer("/item/itemContent"),
                    content: &item["item"],
                });
            }
        } else {
            out.push(Entry {
                id,
                item_content: content.get("itemContent"),
                content,
            });
        }
    }

    for instruction in instructions {
        if let Some(list) = instruction.get("entries").and_then(Value::as_array) {
            for entry in list {
                add(entry, &mut out);
            }
        }
        if let Some(entry) = instruction.get("entry") {
            add(entry, &mut out);
        }
        if let Some(items) = instruction.get("moduleItems").and_then(Value::as_array) {
            for item in items {
                out.push(Entry {
                    id: str_at(item, "/entryId").unwrap_or(""),
                    item_content: item.pointer("/item/itemContent"),
                    content: &item["item"],
                });
            }
        }
    }
    out
}

/// Instructions array at `pointer`, or an empty slice when the shape changed.
pub fn instructions_at<'a>(body: &'a Value, pointer: &str) -> &'a [Value] {
    body.pointer(pointer)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Try several pointers (the API moves timelines between schema versions).
pub fn instructions_any<'a>(body: &'a Value, pointers: &[&str]) -> &'a [Value] {
    pointers
        .iter()
        .map(|p| instructions_at(body, p))
        .find(|i| !i.is_empty())
        .unwrap_or(&[])
}

pub fn bottom_cursor(instructions: &[Value]) -> Option<String> {
    entries(instructions).into_iter().find_map(|entry| {
        let cursor = entry
            .item_content
            .filter(|c| c.get("cursorType").is_some())
            .unwrap_or(entry.content);
        let is_bottom = str_at(cursor, "/cursorType") == Some("Bottom")
            || entry.id.starts_with("cursor-bottom-");
        if is_bottom {
            string_at(cursor, "/value")
        } else {
            None
        }
    })
}

/// Unwrap visibility wrappers; tombstones and unavailable tweets yield `None`.
fn unwrap_tweet(result: &Value) -> Option<&Value> {
    match str_at(result, "/__typename") {
        Some("TweetWithVisibilityResults") => result.get("tweet"),
        Some("TweetTombstone") | Some("TweetUnavailable") => None,
        _ if result.get("rest_id").is_some() => Some(result),
        _ => None,
    }
}

pub fn parse_tweet_result(result: &Value, quote_depth: usize) -> Option<Tweet> {
    let tweet = unwrap_tweet(result)?;
    let legacy = tweet.get("legacy")?;
    let id = string_at(tweet, "/rest_id")?;

    let user = tweet.pointer("/core/user_results/result")?;
    let username = first_string(user, &["/core/screen_name", "/legacy/screen_name"])?;
    let name = first_string(user, &["/core/name", "/legacy/name"]).unwrap_or_else(|| username.clone());

    let text = string_at(tweet, "/note_tweet/note_tweet_results/result/text")
        .or_else(|| str_at(legacy, "/full_text").map(str::to_string))?;

    let quoted_tweet = if quote_depth > 0 {
        tweet
            .pointer("/quoted_status_result/result")
            .and_then(|q| parse_tweet_result(q, quote_depth - 1))
            .map(Box::new)
    } else {
        None
    };

    let article = tweet
        .pointer("/article/article_results/result")
        .and_then(|a| {
            string_at(a, "/title").map(|title| TweetArticle {
                title,
                preview_text: string_at(a, "/preview_text"),
            })
        });

    Some(Tweet {
        id,
        text,
        author: TweetAuthor { username, name },
        author_id: string_at(legacy, "/user_id_str").or_else(|| string_at(user, "/rest_id")),
        created_at: string_at(legacy, "/created_at"),
        reply_count: count_at(legacy, "/reply_count"),
        retweet_count: count_at(legacy, "/retweet_count"),
        like_count: count_at(legacy, "/favorite_count"),
        conversation_id: string_at(legacy, "/conversation_id_str"),
        in_reply_to_status_id: string_at(legacy, "/in_reply_to_status_id_str"),
        media: parse_media(legacy),
        quoted_tweet,
        article,
    })
}

fn parse_media(legacy: &Value) -> Vec<TweetMedia> {
    let Some(items) = legacy
        .pointer("/extended_entities/media")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|m| {
            let kind = match str_at(m, "/type")? {
                "photo" => MediaKind::Photo,
                "video" => MediaKind::Video,
                "animated_gif" => MediaKind::AnimatedGif,
                _ => return None,
            };
            let image = string_at(m, "/media_url_https")?;
            let video_url = m
                .pointer("/video_info/variants")
                .and_then(Value::as_array)
                .and_then(|variants| {
                    variants
                        .iter()
                        .filter(|v| str_at(v, "/content_type") == Some("video/mp4"))
                        .max_by_key(|v| count_at(v, "/bitrate"))
                        .and_then(|v| string_at(v, "/url"))
                });
            let (url, preview_url) = match kind {
                MediaKind::Photo => (image, None),
                _ => (video_url.clone().unwrap_or_else(|| image.clone()), Some(image)),
            };
            Some(TweetMedia {
                kind,
                url,
                preview_url,
                width: m
                    .pointer("/original_info/width")
                    .and_then(Value::as_u64)
                    .map(|w| w as u32),
                height: m
                    .pointer("/original_info/height")
                    .and_then(Value::as_u64)
                    .map(|h| h as u32),
                video_url,
            })
        })
        .collect()
}

pub fn parse_user_result(result: &Value) -> Option<TwitterUser> {
    if str_at(result, "/__typename") == Some("UserUnavailable") {
        return None;
    }
    let id = string_at(result, "/rest_id")?;
    let username = first_string(result, &["/core/screen_name", "/legacy/screen_name"])?;
    Some(TwitterUser {
        id,
        name: first_string(result, &["/core/name", "/legacy/name"]).unwrap_or_else(|| username.clone()),
        username,
        description: first_string(result, &["/legacy/description", "/profile_bio/description"]),
        followers_count: count_at(result, "/legacy/followers_count"),
        following_count: count_at(result, "/legacy/friends_count"),
        is_blue_verified: result
            .get("is_blue_verified")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        profile_image_url: first_string(
            result,
            &["/avatar/image_url", "/legacy/profile_image_url_https"],
        ),
        created_at: first_string(result, &["/core/created_at", "/legacy/created_at"]),
    })
}

pub fn parse_timeline_tweets(instructions: &[Value], quote_depth: usize) -> Vec<Tweet> {
    entries(instructions)
        .into_iter()
        .filter_map(|e| e.item_content?.pointer("/tweet_results/result"))
        .filter_map(|r| parse_tweet_result(r, quote_depth))
        .collect()
}

pub fn parse_timeline_users(instructions: &[Value]) -> Vec<TwitterUser> {
    entries(instructions)
        .into_iter()
        .filter_map(|e| e.item_content?.pointer("/user_results/result"))
        .filter_map(parse_user_result)
        .collect()
}

/// Post counts like `12.3K posts`, `1,204 posts` or `2M Tweets`.
pub fn parse_count(text: &str) -> Option<u64> {
    let number = text.split_whitespace().next()?.replace(',', "");
    let (digits, multiplier) = match number.chars().last()? {
        'K' | 'k' => (&number[..number.len() - 1], 1_000f64),
        'M' | 'm' => (&number[..number.len() - 1], 1_000_000f64),
        'B' | 'b' => (&number[..number.len() - 1], 1_000_000_000f64),
        _ => (number.as_str(), 1f64),
    };
    let value: f64 = digits.parse().ok()?;
    Some((value * multiplier).round() as u64)
}

fn is_count_piece(piece: &str) -> bool {
    let lower = piece.to_lowercase();
    (lower.contains("post") || lower.contains("tweet")) && parse_count(piece).is_some()
}

fn is_time_piece(piece: &str) -> bool {
    let lower = piece.to_lowercase();
    lower.ends_with(" ago")
        || matches!(
            lower.as_str(),
            "now" | "live" | "today" | "yesterday" | "trending now" | "just now"
        )
}

/// Split `"News · 3 hours ago · 12.3K posts"` into category, time-ago and post count.
pub fn split_trend_context(text: &str) -> (Option<String>, Option<String>, Option<u64>) {
    let mut category = None;
    let mut time_ago = None;
    let mut post_count = None;

    for piece in text.split('·').map(str::trim).filter(|p| !p.is_empty()) {
        if is_count_piece(piece) {
            post_count = post_count.or_else(|| parse_count(piece));
        } else if is_time_piece(piece) {
            time_ago = time_ago.or_else(|| Some(piece.to_string()));
        } else if category.is_none() {
            category = Some(piece.to_string());
        }
    }
    (category, time_ago, post_count)
}

fn is_trend(content: &Value) -> bool {
    matches!(
        str_at(content, "/__typename").or_else(|| str_at(content, "/itemType")),
        Some("TimelineTrend")
    )
}

pub fn parse_news_entries(instructions: &[Value], tab: &str) -> Vec<NewsItem> {
    entries(instructions)
        .into_iter()
        .filter_map(|entry| {
            let trend = entry.item_content.filter(|c| is_trend(c))?;
            let headline = string_at(trend, "/name")?;

            let context = [
                "/trend_metadata/domain_context",
                "/social_context/text",
                "/trend_metadata/meta_description",
            ]
            .iter()
            .filter_map(|p| string_at(trend, p))
            .collect::<Vec<_>>()
            .join(" · ");
            let (category, time_ago, post_count) = split_trend_context(&context);

            let id = if entry.id.is_empty() {
                headline.to_lowercase().replace(' ', "-")
            } else {
                entry.id.to_string()
            };

            Some(NewsItem {
                id,
                headline,
                category,
                time_ago,
                post_count,
                description: string_at(trend, "/description"),
                url: string_at(trend, "/trend_url/url"),
                source_tab: tab.to_string(),
                tweets: None,
            })
        })
        .collect()
}

/// GraphQL `errors[]` as an API error, if any.
pub fn graphql_errors(body: &Value) -> Option<TwitterError> {
    let errors = body.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }
    let messages = errors
        .iter()
        .map(|e| {
            str_at(e, "/message")
                .unwrap_or("unknown error")
                .to_string()
        })
        .collect();
    let codes = errors
        .iter()
        .filter_map(|e| {
            e.get("code")
                .or_else(|| e.pointer("/extensions/code"))
                .and_then(Value::as_i64)
        })
        .collect();
    Some(TwitterError::Api { messages, codes })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    pub fn user(id: &str, screen_name: &str, name: &str) -> Value {
        json!({
            "__typename": "User",
            "rest_id": id,
            "is_blue_verified": true,
            "legacy": {
                "screen_name": screen_name,
                "name": name,
                "description": "bio",
                "followers_count": 10,
                "friends_count": 5
            }
        })
    }

    pub fn tweet(id: &str, screen_name: &str, text: &str) -> Value {
        json!({
            "__typename": "Tweet",
            "rest_id": id,
            "core": { "user_results": { "result": user("42", screen_name, "Some Name") } },
            "legacy": {
                "full_text": text,
                "created_at": "Wed Oct 10 20:19:24 +0000 2018",
                "reply_count": 1,
                "retweet_count": 2,
                "favorite_count": 3,
                "conversation_id_str": id,
                "user_id_str": "42"
            }
        })
    }

    pub fn tweet_entry(id: &str, result: Value) -> Value {
        json!({
            "entryId": format!("tweet-{}", id),
            "content": {
                "entryType": "TimelineTimelineItem",
                "itemContent": { "itemType": "TimelineTweet", "tweet_results": { "result": result } }
            }
        })
    }

    pub fn cursor_entry(kind: &str, value: &str) -> Value {
        json!({
            "entryId": format!("cursor-{}-1", kind.to_lowercase()),
            "content": {
                "entryType": "TimelineTimelineCursor",
                "cursorType": kind,
                "value": value
            }
        })
    }

    pub fn timeline(entries: Vec<Value>) -> Vec<Value> {
        vec![json!({ "type": "TimelineAddEntries", "entries": entries })]
    }

    pub fn trend_entry(id: &str, name: &str, context: &str) -> Value {
        json!({
            "entryId": id,
            "content": {
                "entryType": "TimelineTimelineItem",
                "itemContent": {
                    "itemType": "TimelineTrend",
                    "name": name,
                    "trend_url": { "url": format!("twitter://trending?id={}", id) },
                    "trend_metadata": { "domain_context": context }
                }
            }
        })
    }
}
