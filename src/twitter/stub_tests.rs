//! Client round trips against a local axum server standing in for x.com.

use super::parse::fixtures::{cursor_entry, timeline, trend_entry, tweet, tweet_entry};
use super::{ClientOptions, Endpoints, NewsOptions, NewsTab, Operation, TwitterClient};
use crate::credentials::Cookies;
use axum::body::Bytes;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Hits = Arc<Mutex<Vec<String>>>;

/// Serve the router built for the bound base URL; returns that base URL.
async fn spawn_stub(build: impl FnOnce(String) -> Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = build(base.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

fn client(base: &str) -> TwitterClient {
    let mut options = ClientOptions::new(Cookies {
        auth_token: Some("auth".to_string()),
        ct0: Some("csrf".to_string()),
        cookie_header: None,
        source: Some("test".to_string()),
    });
    options.query_id_cache = None;
    options.endpoints = Endpoints {
        graphql: format!("{}/graphql", base),
        rest: format!("{}/1.1", base),
        upload: format!("{}/upload.json", base),
        discovery_pages: vec![format!("{}/home", base)],
    };
    TwitterClient::new(options).unwrap()
}

/// A router whose `/graphql/{id}/{op}` answers with `respond(op)` and logs
/// every `id/op` it sees.
fn graphql_stub(hits: Hits, respond: fn(&str) -> (StatusCode, Value)) -> Router {
    Router::new().route(
        "/graphql/{id}/{op}",
        get({
            let hits = hits.clone();
            move |Path((id, op)): Path<(String, String)>| {
                hits.lock().unwrap().push(format!("{}/{}", id, op));
                let (status, body) = respond(&op);
                async move { (status, Json(body)) }
            }
        })
        .post(move |Path((id, op)): Path<(String, String)>| {
            hits.lock().unwrap().push(format!("{}/{}", id, op));
            let (status, body) = respond(&op);
            async move { (status, Json(body)) }
        }),
    )
}

fn search_body() -> Value {
    json!({ "data": { "search_by_raw_query": { "search_timeline": { "timeline": {
        "instructions": timeline(vec![
            tweet_entry("11", tweet("11", "jack", "first")),
            tweet_entry("10", tweet("10", "jack", "second")),
            cursor_entry("Bottom", "search-next"),
        ])
    } } } } })
}

/// Discovery page plus a bundle that maps SearchTimeline to `fresh-search-id`.
fn discovery_routes(router: Router, base: &str) -> Router {
    let page = format!(
        r#"<html><head><script src="{}/responsive-web/client-web/main.js"></script></head></html>"#,
        base
    );
    router
        .route("/home", get(move || {
            let page = page.clone();
            async move { Html(page) }
        }))
        .route(
            "/responsive-web/client-web/main.js",
            get(|| async {
                r#"e.exports={queryId:"fresh-search-id",operationName:"SearchTimeline",operationType:"query"}"#
            }),
        )
}

#[tokio::test]
async fn rotated_query_id_is_refreshed_and_retried() {
    let hits: Hits = Arc::default();
    let log = hits.clone();
    let base = spawn_stub(move |base| {
        let graphql = Router::new().route(
            "/graphql/{id}/{op}",
            get(move |Path((id, op)): Path<(String, String)>| {
                log.lock().unwrap().push(id.clone());
                let reply = if id == "fresh-search-id" && op == "SearchTimeline" {
                    (StatusCode::OK, Json(search_body()))
                } else {
                    (StatusCode::NOT_FOUND, Json(json!({})))
                };
                async move { reply }
            }),
        );
        discovery_routes(graphql, &base)
    })
    .await;

    let client = client(&base);
    let page = client.search("rust", 20, None).await.unwrap();

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.next_cursor.as_deref(), Some("search-next"));
    assert_eq!(
        *hits.lock().unwrap(),
        vec![
            Operation::SearchTimeline.fallback_id().to_string(),
            "fresh-search-id".to_string()
        ]
    );
    assert_eq!(client.query_ids().get(Operation::SearchTimeline), "fresh-search-id");
}

#[tokio::test]
async fn query_id_refresh_retries_only_once() {
    let hits: Hits = Arc::default();
    let log = hits.clone();
    let base = spawn_stub(move |base| {
        let graphql = Router::new().route(
            "/graphql/{id}/{op}",
            get(move |Path((id, _op)): Path<(String, String)>| {
                log.lock().unwrap().push(id);
                async { (StatusCode::NOT_FOUND, Json(json!({}))) }
            }),
        );
        discovery_routes(graphql, &base)
    })
    .await;

    let err = client(&base).search("rust", 20, None).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(hits.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_refresh_returns_the_original_404() {
    let hits: Hits = Arc::default();
    let stub = graphql_stub(hits.clone(), |_| (StatusCode::NOT_FOUND, json!({})));
    let base = spawn_stub(move |_| stub).await;

    // no discovery page is served, so the refresh itself fails
    let err = client(&base).search("rust", 20, None).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(hits.lock().unwrap().len(), 1);
}

fn legacy_update_stub(
    graphql_hits: Hits,
    respond: fn(&str) -> (StatusCode, Value),
    forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
) -> Router {
    graphql_stub(graphql_hits, respond).route(
        "/1.1/statuses/update.json",
        post(move |Form(form): Form<HashMap<String, String>>| {
            forms.lock().unwrap().push(form);
            async { Json(json!({ "id_str": "999" })) }
        }),
    )
}

#[tokio::test]
async fn automation_block_falls_back_to_status_update() {
    let hits: Hits = Arc::default();
    let forms: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::default();
    let stub = legacy_update_stub(
        hits.clone(),
        |_| {
            (
                StatusCode::OK,
                json!({ "errors": [{ "message": "This request looks like it might be automated.", "code": 226 }] }),
            )
        },
        forms.clone(),
    );
    let base = spawn_stub(move |_| stub).await;

    let media = vec!["m1".to_string(), "m2".to_string()];
    let id = client(&base).reply("hello", "20", &media).await.unwrap();

    assert_eq!(id, "999");
    assert_eq!(hits.lock().unwrap().len(), 1);
    let forms = forms.lock().unwrap();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0]["status"], "hello");
    assert_eq!(forms[0]["in_reply_to_status_id"], "20");
    assert_eq!(forms[0]["auto_populate_reply_metadata"], "true");
    assert_eq!(forms[0]["media_ids"], "m1,m2");
}

#[tokio::test]
async fn other_create_tweet_errors_do_not_fall_back() {
    let forms: Arc<Mutex<Vec<HashMap<String, String>>>> = Arc::default();
    let stub = legacy_update_stub(
        Arc::default(),
        |_| {
            (
                StatusCode::FORBIDDEN,
                json!({ "errors": [{ "message": "Status is a duplicate.", "code": 187 }] }),
            )
        },
        forms.clone(),
    );
    let base = spawn_stub(move |_| stub).await;

    let err = client(&base).tweet("hello", &[]).await.unwrap_err();
    assert!(err.to_string().contains("duplicate"));
    assert!(forms.lock().unwrap().is_empty());
}

#[tokio::test]
async fn related_tweet_failures_keep_the_news() {
    let stub = graphql_stub(Arc::default(), |op| match op {
        "GenericTimelineById" => (
            StatusCode::OK,
            json!({ "data": { "timeline": { "timeline": { "instructions": timeline(vec![
                trend_entry("trend-1", "Eclipse tonight", "Science · LIVE · 40K posts"),
                trend_entry("trend-2", "Election results", "Politics · 2 hours ago · 1,204 posts"),
            ]) } } } }),
        ),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, json!({})),
    });
    let base = spawn_stub(move |_| stub).await;

    let options = NewsOptions {
        count: 5,
        tabs: vec![NewsTab::News],
        with_tweets: true,
        tweets_per_item: 2,
    };
    let items = client(&base).get_news(&options).await.unwrap();

    assert_eq!(items.len(), 2);
    assert_eq!(items[0].headline, "Eclipse tonight");
    assert!(items.iter().all(|item| item.tweets.is_none()));
}

#[tokio::test]
async fn related_tweets_are_attached_and_truncated() {
    let stub = graphql_stub(Arc::default(), |op| match op {
        "GenericTimelineById" => (
            StatusCode::OK,
            json!({ "data": { "timeline": { "timeline": { "instructions": timeline(vec![
                trend_entry("trend-1", "Eclipse tonight", "Science · LIVE · 40K posts"),
            ]) } } } }),
        ),
        "SearchTimeline" => (StatusCode::OK, search_body()),
        _ => (StatusCode::NOT_FOUND, json!({})),
    });
    let base = spawn_stub(move |_| stub).await;

    let options = NewsOptions {
        count: 5,
        tabs: vec![NewsTab::News],
        with_tweets: true,
        tweets_per_item: 1,
    };
    let items = client(&base).get_news(&options).await.unwrap();
    let tweets = items[0].tweets.as_ref().unwrap();
    assert_eq!(tweets.len(), 1);
    assert_eq!(tweets[0].id, "11");
}

#[tokio::test]
async fn timelines_read_their_own_instruction_paths() {
    let stub = graphql_stub(Arc::default(), |op| {
        let instructions = timeline(vec![
            tweet_entry("7", tweet("7", "jack", op)),
            cursor_entry("Bottom", &format!("{}-next", op)),
        ]);
        let body = match op {
            "HomeTimeline" | "HomeLatestTimeline" => {
                json!({ "data": { "home": { "home_timeline_urt": { "instructions": instructions } } } })
            }
            "Bookmarks" => {
                json!({ "data": { "bookmark_timeline_v2": { "timeline": { "instructions": instructions } } } })
            }
            _ => return (StatusCode::NOT_FOUND, json!({})),
        };
        (StatusCode::OK, body)
    });
    let base = spawn_stub(move |_| stub).await;
    let client = client(&base);

    let home = client.get_home_timeline(false, 20, None).await.unwrap();
    assert_eq!(home.items[0].text, "HomeTimeline");
    assert_eq!(home.next_cursor.as_deref(), Some("HomeTimeline-next"));

    let latest = client.get_home_timeline(true, 20, None).await.unwrap();
    assert_eq!(latest.items[0].text, "HomeLatestTimeline");

    let bookmarks = client.get_bookmarks(20, None).await.unwrap();
    assert_eq!(bookmarks.items[0].text, "Bookmarks");
    assert_eq!(bookmarks.next_cursor.as_deref(), Some("Bookmarks-next"));
}

#[tokio::test]
async fn tweet_detail_feeds_replies_and_thread() {
    let stub = graphql_stub(Arc::default(), |op| {
        if op != "TweetDetail" {
            return (StatusCode::NOT_FOUND, json!({}));
        }
        let in_convo = |id: &str, who: &str| {
            let mut raw = tweet(id, who, &format!("tweet {}", id));
            raw["legacy"]["conversation_id_str"] = json!("100");
            tweet_entry(id, raw)
        };
        (
            StatusCode::OK,
            json!({ "data": { "threaded_conversation_with_injections_v2": {
                "instructions": timeline(vec![
                    in_convo("100", "jack"),
                    in_convo("200", "jack"),
                    in_convo("300", "alice"),
                    in_convo("400", "jack"),
                    cursor_entry("Bottom", "more-replies"),
                ])
            } } }),
        )
    });
    let base = spawn_stub(move |_| stub).await;
    let client = client(&base);

    let replies = client.get_replies("200", None).await.unwrap();
    let ids: Vec<&str> = replies.items.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["100", "300", "400"]);
    assert_eq!(replies.next_cursor.as_deref(), Some("more-replies"));

    let thread = client.get_thread("200").await.unwrap();
    let ids: Vec<&str> = thread.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["100", "200", "400"]);

    assert_eq!(client.get_tweet("300").await.unwrap().author.username, "alice");
}

/// INIT and FINALIZE come in as urlencoded forms, APPEND as multipart.
async fn upload_command(body: Bytes, finalize: Value) -> Json<Value> {
    let body = String::from_utf8_lossy(&body);
    if body.contains("command=INIT") {
        Json(json!({ "media_id_string": "555" }))
    } else if body.contains("command=FINALIZE") {
        Json(finalize)
    } else {
        Json(Value::Null)
    }
}

fn image_file() -> tempfile::NamedTempFile {
    let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    std::fs::write(file.path(), b"\x89PNG fake image bytes").unwrap();
    file
}

#[tokio::test]
async fn upload_without_processing_is_ready() {
    let base = spawn_stub(|_| {
        Router::new().route(
            "/upload.json",
            post(|body: Bytes| upload_command(body, json!({ "media_id_string": "555" }))),
        )
    })
    .await;

    let image = image_file();
    let upload = client(&base).upload_media(image.path()).await.unwrap();
    assert_eq!(upload.media_id, "555");
    assert_eq!(upload.media_type, "image/png");
    assert_eq!(upload.size, 21);
}

#[tokio::test]
async fn upload_that_never_finishes_processing_times_out() {
    let polls = Arc::new(Mutex::new(0usize));
    let counter = polls.clone();
    let pending = json!({ "processing_info": { "state": "in_progress", "check_after_secs": 0 } });
    let finalize = pending.clone();
    let base = spawn_stub(move |_| {
        Router::new().route(
            "/upload.json",
            post(move |body: Bytes| upload_command(body, finalize.clone())).get(move || {
                *counter.lock().unwrap() += 1;
                let pending = pending.clone();
                async move { Json(pending) }
            }),
        )
    })
    .await;

    let image = image_file();
    let err = client(&base).upload_media(image.path()).await.unwrap_err();
    assert!(err.to_string().contains("timed out"), "{}", err);
    assert_eq!(*polls.lock().unwrap(), super::post::MAX_STATUS_POLLS);
}

#[tokio::test]
async fn query_id_discovery_sends_browser_user_agent() {
    let agents: Hits = Arc::default();
    let seen = agents.clone();
    let base = spawn_stub(move |_| {
        Router::new().route(
            "/home",
            get(move |headers: axum::http::HeaderMap| {
                let agent = headers
                    .get(axum::http::header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                seen.lock().unwrap().push(agent);
                async { Html("<html></html>") }
            }),
        )
    })
    .await;

    let http = super::http_client(std::time::Duration::from_secs(5)).unwrap();
    let err = super::query_ids::refresh(&http, &[format!("{}/home", base)])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no client bundles"));
    assert_eq!(*agents.lock().unwrap(), vec![super::USER_AGENT.to_string()]);
}
