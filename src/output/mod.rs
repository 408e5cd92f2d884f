//! Terminal rendering for tweets, users and news items.

use crate::twitter::{MediaKind, NewsItem, Page, Tweet, TwitterUser};
use chrono::{DateTime, Utc};
use crossterm::style::{Color, Stylize};
use serde::Serialize;
use std::io::IsTerminal;

const DEFAULT_WIDTH: usize = 100;
const RULE_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Printer {
    pub json: bool,
    /// No emoji, no color.
    pub plain: bool,
    pub color: bool,
    pub width: usize,
}

impl Printer {
    pub fn new(json: bool, plain: bool, no_color: bool) -> Self {
        let color = !plain
            && !no_color
            && std::env::var_os("NO_COLOR").is_none()
            && std::io::stdout().is_terminal();
        let width = crossterm::terminal::size()
            .map(|(cols, _)| (cols as usize).clamp(40, DEFAULT_WIDTH))
            .unwrap_or(DEFAULT_WIDTH);
        Self {
            json,
            plain,
            color,
            width,
        }
    }

    /// Uncolored, emoji-free output at a fixed width.
    pub fn plain() -> Self {
        Self {
            json: false,
            plain: true,
            color: false,
            width: DEFAULT_WIDTH,
        }
    }

    fn paint(&self, text: &str, color: Color, bold: bool) -> String {
        if !self.color {
            return text.to_string();
        }
        let styled = text.with(color);
        if bold {
            styled.bold().to_string()
        } else {
            styled.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            text.dim().to_string()
        } else {
            text.to_string()
        }
    }

    fn icon<'a>(&self, emoji: &'a str, label: &'a str) -> &'a str {
        if self.plain {
            label
        } else {
            emoji
        }
    }

    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn format_tweet(&self, tweet: &Tweet, now: DateTime<Utc>) -> String {
        let mut lines = Vec::new();

        let mut header = format!(
            "{} ({})",
            self.paint(&format!("@{}", tweet.author.username), Color::Cyan, true),
            tweet.author.name
        );
        if let Some(ago) = tweet.created_at.as_deref().and_then(|c| relative_time(c, now)) {
            header.push_str(&self.dim(&format!(" · {}", ago)));
        }
        lines.push(header);

        if !tweet.text.is_empty() {
            lines.push(textwrap::fill(&tweet.text, self.width));
        }

        if let Some(article) = &tweet.article {
            lines.push(format!("{} {}", self.icon("📰", "article:"), article.title));
            if let Some(preview) = &article.preview_text {
                lines.push(self.dim(&textwrap::fill(preview, self.width)));
            }
        }

        for media in &tweet.media {
            let (emoji, label) = match media.kind {
                MediaKind::Photo => ("🖼 ", "[photo]"),
                MediaKind::Video => ("🎬", "[video]"),
                MediaKind::AnimatedGif => ("🎞 ", "[gif]"),
            };
            lines.push(format!("{} {}", self.icon(emoji, label), media.url));
        }

        if let Some(quoted) = &tweet.quoted_tweet {
            let bar = if self.plain { ">" } else { "┃" };
            let inner = self.format_tweet(quoted, now);
            for line in inner.lines().filter(|l| !l.is_empty()) {
                lines.push(format!("  {} {}", self.dim(bar), line));
            }
        }

        let stats = if self.plain {
            format!(
                "replies: {}  retweets: {}  likes: {}",
                tweet.reply_count, tweet.retweet_count, tweet.like_count
            )
        } else {
            format!(
                "💬 {}  🔁 {}  ❤️ {}",
                tweet.reply_count, tweet.retweet_count, tweet.like_count
            )
        };
        lines.push(self.dim(&stats));
        lines.push(format!(
            "{} {}",
            self.icon("🔗", "url:"),
            self.paint(&tweet.url(), Color::Blue, false)
        ));
        lines.join("\n")
    }

    pub fn format_user(&self, user: &TwitterUser) -> String {
        let mut header = format!(
            "{} ({})",
            self.paint(&format!("@{}", user.username), Color::Cyan, true),
            user.name
        );
        if user.is_blue_verified {
            header.push_str(if self.plain { " [verified]" } else { " ✓" });
        }
        let mut lines = vec![header];
        if let Some(bio) = user.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(self.indented(bio, "  "));
        }
        lines.push(self.dim(&format!(
            "  followers: {} · following: {}",
            format_count(user.followers_count),
            format_count(user.following_count)
        )));
        lines.join("\n")
    }

    pub fn format_news_item(&self, index: usize, item: &NewsItem) -> String {
        let mut lines = vec![format!(
            "{}. {}",
            index + 1,
            self.paint(&item.headline, Color::White, true)
        )];

        let mut meta: Vec<String> = Vec::new();
        if let Some(category) = &item.category {
            meta.push(category.clone());
        }
        if let Some(ago) = &item.time_ago {
            meta.push(ago.clone());
        }
        if let Some(posts) = item.post_count {
            meta.push(format!("{} posts", format_count(posts)));
        }
        meta.push(format!("[{}]", item.source_tab));
        lines.push(self.dim(&format!("   {}", meta.join(" · "))));

        if let Some(description) = &item.description {
            lines.push(self.indented(description, "   "));
        }
        for tweet in item.tweets.iter().flatten() {
            let text: String = tweet.text.chars().take(140).collect();
            lines.push(format!(
                "   {} @{}: {}",
                self.dim(if self.plain { ">" } else { "┃" }),
                tweet.author.username,
                text.replace('\n', " ")
            ));
        }
        lines.join("\n")
    }

    fn indented(&self, text: &str, prefix: &str) -> String {
        let options = textwrap::Options::new(self.width)
            .initial_indent(prefix)
            .subsequent_indent(prefix);
        textwrap::fill(text, options)
    }

    fn separator(&self) -> String {
        self.dim(&(if self.plain { "-" } else { "─" }).repeat(RULE_WIDTH))
    }

    pub fn print_tweets(&self, tweets: &[Tweet]) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(tweets);
        }
        if tweets.is_empty() {
            println!("No tweets found.");
            return Ok(());
        }
        let now = Utc::now();
        for tweet in tweets {
            println!("{}", self.format_tweet(tweet, now));
            println!("{}", self.separator());
        }
        Ok(())
    }

    pub fn print_users(&self, users: &[TwitterUser]) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(users);
        }
        if users.is_empty() {
            println!("No users found.");
            return Ok(());
        }
        for user in users {
            println!("{}\n", self.format_user(user));
        }
        Ok(())
    }

    pub fn print_news(&self, items: &[NewsItem]) -> anyhow::Result<()> {
        if self.json {
            return self.print_json(items);
        }
        if items.is_empty() {
            println!("No news found.");
            return Ok(());
        }
        for (index, item) in items.iter().enumerate() {
            println!("{}\n", self.format_news_item(index, item));
        }
        Ok(())
    }

    /// Paged reads show the cursor so the next call can resume.
    pub fn print_tweet_page(&self, page: &Page<Tweet>, paged: bool) -> anyhow::Result<()> {
        if self.json && paged {
            return self.print_json(page);
        }
        self.print_tweets(&page.items)?;
        self.print_cursor(page.next_cursor.as_deref(), paged);
        Ok(())
    }

    pub fn print_user_page(&self, page: &Page<TwitterUser>, paged: bool) -> anyhow::Result<()> {
        if self.json && paged {
            return self.print_json(page);
        }
        self.print_users(&page.items)?;
        self.print_cursor(page.next_cursor.as_deref(), paged);
        Ok(())
    }

    fn print_cursor(&self, cursor: Option<&str>, paged: bool) {
        if let (true, false, Some(cursor)) = (paged, self.json, cursor) {
            eprintln!("{} --cursor {}", self.dim("next page:"), cursor);
        }
    }

    pub fn success(&self, msg: &str) {
        let mark = if self.plain { "ok:" } else { "✓" };
        println!("{} {}", self.paint(mark, Color::Green, true), msg);
    }

    pub fn warning(&self, msg: &str) {
        eprintln!("{} {}", self.paint("warning:", Color::Yellow, true), msg);
    }

    pub fn error(&self, msg: &str) {
        eprintln!("{} {}", self.paint("error:", Color::Red, true), msg);
    }

    pub fn hint(&self, msg: &str) {
        eprintln!("{} {}", self.dim("hint:"), self.dim(msg));
    }
}

/// `12300` → `12.3K`. Anything that would round up to `1000K` reads as `1M`.
pub fn format_count(n: u64) -> String {
    match n {
        0..=9_999 => n.to_string(),
        10_000..=999_949 => trim_decimal(n as f64 / 1_000.0, "K"),
        _ => trim_decimal(n as f64 / 1_000_000.0, "M"),
    }
}

fn trim_decimal(value: f64, suffix: &str) -> String {
    let text = format!("{:.1}", value);
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{}{}", text, suffix)
}

/// `created_at` as `5m`, `3h`, `2d` or a date for anything older than a week.
pub fn relative_time(created_at: &str, now: DateTime<Utc>) -> Option<String> {
    let created = DateTime::parse_from_str(created_at, "%a %b %d %H:%M:%S %z %Y")
        .ok()?
        .with_timezone(&Utc);
    let secs = (now - created).num_seconds().max(0);
    let text = match secs {
        0..=59 => format!("{}s", secs),
        60..=3_599 => format!("{}m", secs / 60),
        3_600..=86_399 => format!("{}h", secs / 3_600),
        86_400..=604_799 => format!("{}d", secs / 86_400),
        _ => created.format("%b %-d, %Y").to_string(),
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twitter::{TweetAuthor, TweetMedia};
    use chrono::TimeZone;

    fn sample_tweet() -> Tweet {
        Tweet {
            id: "20".to_string(),
            text: "just setting up my twttr".to_string(),
            author: TweetAuthor {
                username: "jack".to_string(),
                name: "jack".to_string(),
            },
            author_id: Some("12".to_string()),
            created_at: Some("Tue Mar 21 20:50:14 +0000 2006".to_string()),
            reply_count: 1,
            retweet_count: 2,
            like_count: 3,
            conversation_id: Some("20".to_string()),
            in_reply_to_status_id: None,
            media: vec![TweetMedia {
                kind: MediaKind::Photo,
                url: "https://pbs.twimg.com/media/x.jpg".to_string(),
                preview_url: None,
                width: None,
                height: None,
                video_url: None,
            }],
            quoted_tweet: None,
            article: None,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2006, 3, 21, 23, 0, 0).unwrap()
    }

    #[test]
    fn test_plain_tweet_rendering() {
        let out = Printer::plain().format_tweet(&sample_tweet(), now());
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "@jack (jack) · 2h");
        assert_eq!(lines[1], "just setting up my twttr");
        assert_eq!(lines[2], "[photo] https://pbs.twimg.com/media/x.jpg");
        assert_eq!(lines[3], "replies: 1  retweets: 2  likes: 3");
        assert_eq!(lines[4], "url: https://x.com/jack/status/20");
    }

    #[test]
    fn test_quoted_tweet_is_indented() {
        let mut tweet = sample_tweet();
        let mut quoted = sample_tweet();
        quoted.id = "19".to_string();
        quoted.media.clear();
        tweet.quoted_tweet = Some(Box::new(quoted));
        let out = Printer::plain().format_tweet(&tweet, now());
        assert!(out.contains("  > @jack (jack) · 2h"));
        assert!(out.contains("  > url: https://x.com/jack/status/19"));
    }

    #[test]
    fn test_news_item_rendering() {
        let item = NewsItem {
            id: "t1".to_string(),
            headline: "Eclipse tonight".to_string(),
            category: Some("Science".to_string()),
            time_ago: Some("LIVE".to_string()),
            post_count: Some(40_000),
            description: None,
            url: None,
            source_tab: "news".to_string(),
            tweets: Some(vec![sample_tweet()]),
        };
        let out = Printer::plain().format_news_item(0, &item);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "1. Eclipse tonight");
        assert_eq!(lines[1], "   Science · LIVE · 40K posts · [news]");
        assert_eq!(lines[2], "   > @jack: just setting up my twttr");
    }

    #[test]
    fn test_user_rendering() {
        let user = TwitterUser {
            id: "1".to_string(),
            username: "alice".to_string(),
            name: "Alice".to_string(),
            description: Some("hello".to_string()),
            followers_count: 12_300,
            following_count: 5,
            is_blue_verified: true,
            profile_image_url: None,
            created_at: None,
        };
        let out = Printer::plain().format_user(&user);
        assert_eq!(
            out,
            "@alice (Alice) [verified]\n  hello\n  followers: 12.3K · following: 5"
        );
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(12_300), "12.3K");
        assert_eq!(format_count(40_000), "40K");
        assert_eq!(format_count(2_500_000), "2.5M");
        assert_eq!(format_count(999_949), "999.9K");
        assert_eq!(format_count(999_950), "1M");
        assert_eq!(format_count(999_999), "1M");
    }

    #[test]
    fn test_relative_time() {
        let now = now();
        assert_eq!(
            relative_time("Tue Mar 21 22:59:30 +0000 2006", now).as_deref(),
            Some("30s")
        );
        assert_eq!(
            relative_time("Tue Mar 21 22:15:00 +0000 2006", now).as_deref(),
            Some("45m")
        );
        assert_eq!(
            relative_time("Mon Mar 01 10:00:00 +0000 2006", now).as_deref(),
            Some("Mar 1, 2006")
        );
        assert_eq!(relative_time("yesterday", now), None);
    }
}
