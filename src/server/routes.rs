use super::assets::{APP_JS, INDEX_HTML, STYLE_CSS};
use crate::error::TwitterError;
use crate::twitter::{NewsItem, NewsOptions, NewsSource, NewsTab};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

const MAX_COUNT: usize = 50;
const MAX_TWEETS_PER_ITEM: usize = 10;

/// Application state shared across handlers
pub struct AppState {
    pub source: Arc<dyn NewsSource>,
}

/// Body of `POST /api/news`; every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsRequest {
    pub count: Option<usize>,
    pub tabs: Option<Vec<String>>,
    pub with_tweets: Option<bool>,
    pub tweets_per_item: Option<usize>,
}

impl NewsRequest {
    pub fn into_options(self) -> Result<NewsOptions, String> {
        let defaults = NewsOptions::default();

        let count = self.count.unwrap_or(defaults.count);
        if count == 0 || count > MAX_COUNT {
            return Err(format!("count must be between 1 and {}", MAX_COUNT));
        }
        let tweets_per_item = self.tweets_per_item.unwrap_or(defaults.tweets_per_item);
        if tweets_per_item > MAX_TWEETS_PER_ITEM {
            return Err(format!(
                "tweetsPerItem must be at most {}",
                MAX_TWEETS_PER_ITEM
            ));
        }
        let tabs = match self.tabs {
            Some(names) if !names.is_empty() => names
                .iter()
                .map(|name| name.parse::<NewsTab>().map_err(|e| e.to_string()))
                .collect::<Result<Vec<_>, _>>()?,
            _ => defaults.tabs,
        };

        Ok(NewsOptions {
            count,
            tabs,
            with_tweets: self.with_tweets.unwrap_or(defaults.with_tweets),
            tweets_per_item,
        })
    }
}

/// An empty body means all defaults.
pub fn parse_news_request(body: &[u8]) -> Result<NewsOptions, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return NewsRequest::default().into_options();
    }
    let request: NewsRequest =
        serde_json::from_slice(body).map_err(|e| format!("invalid request body: {}", e))?;
    request.into_options()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewsResponse {
    success: bool,
    items: Vec<NewsItem>,
    fetched_at: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

fn error_response(status: StatusCode, message: String) -> Response {
    let body = ErrorResponse {
        success: false,
        error: message,
    };
    (status, Json(body)).into_response()
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(index_handler))
        .route("/app.js", get(app_js_handler))
        .route("/style.css", get(style_css_handler))
        .route("/api/news", post(news_handler))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server for the news page
pub async fn serve(source: Arc<dyn NewsSource>, port: u16, open_browser: bool) -> anyhow::Result<()> {
    let app = router(Arc::new(AppState { source }));

    let addr = format!("127.0.0.1:{}", port);
    let url = format!("http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "news server listening");
    println!("Serving the news page at {}", url);
    println!("Press Ctrl+C to stop");

    if open_browser {
        if let Err(e) = open::that(&url) {
            eprintln!("Warning: Could not open browser: {}", e);
        }
    }

    axum::serve(listener, app).await?;
    Ok(())
}

async fn index_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

async fn app_js_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        APP_JS,
    )
}

async fn style_css_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], STYLE_CSS)
}

async fn news_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let options = match parse_news_request(&body) {
        Ok(options) => options,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    match state.source.fetch_news(&options).await {
        Ok(items) => Json(NewsResponse {
            success: true,
            items,
            fetched_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        })
        .into_response(),
        Err(TwitterError::InvalidInput(message)) => {
            error_response(StatusCode::BAD_REQUEST, message)
        }
        Err(e) => {
            error!(error = %e, "news request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body_uses_defaults() {
        let options = parse_news_request(b"").unwrap();
        assert_eq!(options, NewsOptions::default());
        let options = parse_news_request(b"  \n").unwrap();
        assert_eq!(options.count, 10);
    }

    #[test]
    fn test_request_fields_are_camel_case() {
        let options = parse_news_request(
            br#"{"count": 5, "tabs": ["news", "for_you"], "withTweets": true, "tweetsPerItem": 2}"#,
        )
        .unwrap();
        assert_eq!(options.count, 5);
        assert_eq!(options.tabs, vec![NewsTab::News, NewsTab::ForYou]);
        assert!(options.with_tweets);
        assert_eq!(options.tweets_per_item, 2);
    }

    #[test]
    fn test_empty_tab_list_means_all_tabs() {
        let options = parse_news_request(br#"{"tabs": []}"#).unwrap();
        assert_eq!(options.tabs, NewsTab::ALL.to_vec());
    }

    #[test]
    fn test_invalid_requests() {
        assert!(parse_news_request(br#"{"count": 0}"#).is_err());
        assert!(parse_news_request(br#"{"count": 500}"#).is_err());
        assert!(parse_news_request(br#"{"tweetsPerItem": 11}"#).is_err());
        assert!(parse_news_request(br#"{"count": "ten"}"#).is_err());
        assert!(parse_news_request(b"not json").is_err());
        let err = parse_news_request(br#"{"tabs": ["weather"]}"#).unwrap_err();
        assert!(err.contains("weather"));
    }
}
