use super::types::{Identified, Page};
use crate::error::Result;
use std::collections::HashSet;
use std::future::Future;
use tracing::debug;

/// How much of a cursor-paginated timeline to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Items wanted (or the page size when `all` is set).
    pub count: usize,
    pub all: bool,
    pub max_pages: Option<usize>,
    pub cursor: Option<String>,
}

impl PageRequest {
    pub fn first(count: usize) -> Self {
        Self {
            count,
            all: false,
            max_pages: None,
            cursor: None,
        }
    }

    /// Caller asked for explicit paging, so the cursor should be shown.
    pub fn is_paged(&self) -> bool {
        self.all || self.cursor.is_some() || self.max_pages.is_some()
    }
}

/// Follow bottom cursors until the timeline runs out, enough items are
/// collected, or the page cap is hit. Items repeated across pages are dropped.
pub async fn paginate<T, F, Fut>(request: &PageRequest, mut fetch: F) -> Result<Page<T>>
where
    T: Identified,
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut cursor = request.cursor.clone();
    let mut items: Vec<T> = Vec::new();
    let mut seen = HashSet::new();
    let mut pages = 0usize;

    loop {
        let page = fetch(cursor.clone()).await?;
        pages += 1;

        let before = items.len();
        for item in page.items {
            if seen.insert(item.key().to_string()) {
                items.push(item);
            }
        }
        let added = items.len() - before;
        debug!(page = pages, added, total = items.len(), "fetched page");

        let next = page.next_cursor;
        if !request.all && items.len() >= request.count {
            items.truncate(request.count);
            return Ok(Page::new(items, next));
        }

        let exhausted = next.is_none() || next == cursor || added == 0;
        let capped = request.max_pages.is_some_and(|max| pages >= max);
        if exhausted || capped {
            let next = if exhausted && next == cursor { None } else { next };
            return Ok(Page::new(items, next));
        }
        cursor = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twitter::types::TweetAuthor;
    use crate::twitter::Tweet;
    use std::collections::HashMap;

    fn tweet(id: &str) -> Tweet {
        Tweet {
            id: id.to_string(),
            text: format!("tweet {}", id),
            author: TweetAuthor {
                username: "a".to_string(),
                name: "A".to_string(),
            },
            author_id: None,
            created_at: None,
            reply_count: 0,
            retweet_count: 0,
            like_count: 0,
            conversation_id: None,
            in_reply_to_status_id: None,
            media: Vec::new(),
            quoted_tweet: None,
            article: None,
        }
    }

    /// cursor -> (ids, next cursor)
    fn pages() -> HashMap<Option<String>, (Vec<&'static str>, Option<String>)> {
        let mut map = HashMap::new();
        map.insert(None, (vec!["1", "2"], Some("c1".to_string())));
        map.insert(Some("c1".to_string()), (vec!["2", "3"], Some("c2".to_string())));
        map.insert(Some("c2".to_string()), (vec!["4"], None));
        map
    }

    async fn run(request: PageRequest) -> (Page<Tweet>, usize) {
        let pages = pages();
        let mut calls = 0;
        let page = paginate(&request, |cursor| {
            calls += 1;
            let (ids, next) = pages[&cursor].clone();
            async move { Ok(Page::new(ids.into_iter().map(tweet).collect(), next)) }
        })
        .await
        .unwrap();
        (page, calls)
    }

    fn ids(page: &Page<Tweet>) -> Vec<&str> {
        page.items.iter().map(|t| t.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_stops_once_count_reached() {
        let (page, calls) = run(PageRequest::first(2)).await;
        assert_eq!(ids(&page), vec!["1", "2"]);
        assert_eq!(page.next_cursor.as_deref(), Some("c1"));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_dedupes_across_pages() {
        let (page, calls) = run(PageRequest::first(3)).await;
        assert_eq!(ids(&page), vec!["1", "2", "3"]);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_all_reads_until_exhausted() {
        let request = PageRequest {
            count: 20,
            all: true,
            max_pages: None,
            cursor: None,
        };
        let (page, calls) = run(request).await;
        assert_eq!(ids(&page), vec!["1", "2", "3", "4"]);
        assert_eq!(page.next_cursor, None);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_max_pages_caps_and_returns_cursor() {
        let request = PageRequest {
            count: 20,
            all: true,
            max_pages: Some(2),
            cursor: None,
        };
        let (page, calls) = run(request).await;
        assert_eq!(ids(&page), vec!["1", "2", "3"]);
        assert_eq!(page.next_cursor.as_deref(), Some("c2"));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_resume_from_cursor() {
        let request = PageRequest {
            count: 5,
            all: false,
            max_pages: None,
            cursor: Some("c2".to_string()),
        };
        assert!(request.is_paged());
        let (page, _) = run(request).await;
        assert_eq!(ids(&page), vec!["4"]);
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn test_first_page_is_not_paged() {
        assert!(!PageRequest::first(10).is_paged());
    }
}
