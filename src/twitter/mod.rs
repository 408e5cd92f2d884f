//! Client for the x.com web GraphQL API, authenticated with browser session
//! cookies.

pub mod features;
pub mod news;
pub mod paginate;
pub mod parse;
pub mod query_ids;
pub mod types;

mod post;
mod tweets;
mod users;

#[cfg(test)]
mod stub_tests;

pub use news::{NewsOptions, NewsSource, NewsTab};
pub use paginate::{paginate, PageRequest};
pub use post::MediaUpload;
pub use query_ids::{Operation, QueryIdCache, QueryIds};
pub use types::*;

use crate::credentials::Cookies;
use crate::error::{Result, TwitterError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Public bearer token shipped with the x.com web client.
const BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";
const GRAPHQL_BASE: &str = "https://x.com/i/api/graphql";
const REST_BASE: &str = "https://x.com/i/api/1.1";
const UPLOAD_URL: &str = "https://upload.x.com/i/media/upload.json";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Base URLs the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub graphql: String,
    pub rest: String,
    pub upload: String,
    /// Pages scraped for client bundles when query ids are refreshed.
    pub discovery_pages: Vec<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            graphql: GRAPHQL_BASE.to_string(),
            rest: REST_BASE.to_string(),
            upload: UPLOAD_URL.to_string(),
            discovery_pages: query_ids::DISCOVERY_PAGES
                .iter()
                .map(|page| page.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub cookies: Cookies,
    pub timeout: Duration,
    pub quote_depth: usize,
    /// Where to memo scraped query ids; `None` keeps them in memory only.
    pub query_id_cache: Option<PathBuf>,
    pub endpoints: Endpoints,
}

impl ClientOptions {
    pub fn new(cookies: Cookies) -> Self {
        Self {
            cookies,
            timeout: Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS),
            quote_depth: crate::config::DEFAULT_QUOTE_DEPTH,
            query_id_cache: QueryIds::default_path(),
            endpoints: Endpoints::default(),
        }
    }
}

/// Plain HTTP client with the browser user agent x.com expects.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?)
}

pub struct TwitterClient {
    http: reqwest::Client,
    ct0: String,
    cookie_header: String,
    quote_depth: usize,
    query_ids: QueryIds,
    endpoints: Endpoints,
}

impl TwitterClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let cookies = options.cookies;
        let (Some(auth_token), Some(ct0)) = (cookies.auth_token, cookies.ct0) else {
            return Err(TwitterError::MissingCredentials(
                "both auth_token and ct0 are required".to_string(),
            ));
        };
        let cookie_header = cookies
            .cookie_header
            .unwrap_or_else(|| format!("auth_token={}; ct0={}", auth_token, ct0));

        let http = http_client(options.timeout)?;

        Ok(Self {
            http,
            ct0,
            cookie_header,
            quote_depth: options.quote_depth,
            query_ids: QueryIds::load(options.query_id_cache),
            endpoints: options.endpoints,
        })
    }

    pub fn quote_depth(&self) -> usize {
        self.quote_depth
    }

    pub fn query_ids(&self) -> &QueryIds {
        &self.query_ids
    }

    /// Scrape current query ids from x.com and persist them.
    pub async fn refresh_query_ids(&self) -> Result<QueryIdCache> {
        let cache = query_ids::refresh(&self.http, &self.endpoints.discovery_pages).await?;
        self.query_ids.replace(cache.clone())?;
        Ok(cache)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let pairs = [
            ("authorization", format!("Bearer {}", BEARER_TOKEN)),
            ("x-csrf-token", self.ct0.clone()),
            ("x-twitter-auth-type", "OAuth2Session".to_string()),
            ("x-twitter-active-user", "yes".to_string()),
            ("x-twitter-client-language", "en".to_string()),
            ("cookie", self.cookie_header.clone()),
            ("origin", "https://x.com".to_string()),
            ("referer", "https://x.com/".to_string()),
            ("accept", "*/*".to_string()),
        ];
        for (name, value) in pairs {
            match HeaderValue::from_str(&value) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(name), value);
                }
                Err(_) => warn!(header = name, "skipping header with invalid characters"),
            }
        }
        headers
    }

    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url).headers(self.headers())
    }

    /// Send, check the status and decode the JSON body.
    pub(crate) async fn send_json(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        decode_response(status, &text)
    }

    fn graphql_url(&self, op: Operation) -> String {
        format!(
            "{}/{}/{}",
            self.endpoints.graphql,
            self.query_ids.get(op),
            op.name()
        )
    }

    /// Run a GraphQL operation; a 404 means the query id rotated, so refresh
    /// the ids once and retry.
    async fn graphql(
        &self,
        op: Operation,
        method: Method,
        variables: Value,
        features: Value,
        field_toggles: Option<Value>,
    ) -> Result<Value> {
        let mut refreshed = false;
        loop {
            let url = self.graphql_url(op);
            debug!(operation = op.name(), %url, "graphql request");

            let request = if method == Method::GET {
                let mut query = vec![
                    ("variables", variables.to_string()),
                    ("features", features.to_string()),
                ];
                if let Some(toggles) = &field_toggles {
                    query.push(("fieldToggles", toggles.to_string()));
                }
                let query = query
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&");
                self.request(Method::GET, &format!("{}?{}", url, query))
            } else {
                let id = self.query_ids.get(op);
                self.request(method.clone(), &url).json(&json!({
                    "variables": variables,
                    "features": features,
                    "queryId": id,
                }))
            };

            match self.send_json(request).await {
                Err(e) if e.is_not_found() && !refreshed => {
                    warn!(operation = op.name(), "query id rejected, refreshing ids");
                    refreshed = true;
                    if let Err(refresh_err) = self.refresh_query_ids().await {
                        warn!(error = %refresh_err, "query id refresh failed");
                        return Err(e);
                    }
                }
                other => return other,
            }
        }
    }

    pub(crate) async fn graphql_get(
        &self,
        op: Operation,
        variables: Value,
        features: Value,
        field_toggles: Option<Value>,
    ) -> Result<Value> {
        self.graphql(op, Method::GET, variables, features, field_toggles)
            .await
    }

    pub(crate) async fn graphql_post(
        &self,
        op: Operation,
        variables: Value,
        features: Value,
    ) -> Result<Value> {
        self.graphql(op, Method::POST, variables, features, None)
            .await
    }

    pub(crate) async fn rest_get(&self, path: &str) -> Result<Value> {
        let url = format!("{}/{}", self.endpoints.rest, path);
        self.send_json(self.request(Method::GET, &url)).await
    }

    pub(crate) async fn rest_post_form(&self, path: &str, form: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}/{}", self.endpoints.rest, path);
        let request = self.request(Method::POST, &url).form(form);
        self.send_json(request).await
    }
}

/// Map a raw response to JSON or the error it carries. GraphQL `errors[]`
/// only count as a failure when no `data` came back; a 404 always stays a
/// status error so the caller can refresh query ids.
fn decode_response(status: u16, text: &str) -> Result<Value> {
    if !(200..300).contains(&status) {
        // GraphQL sometimes reports errors with a non-2xx status
        if status != 404 {
            if let Some(err) = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|body| parse::graphql_errors(&body))
            {
                return Err(err);
            }
        }
        return Err(TwitterError::status(status, text));
    }

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let body: Value = serde_json::from_str(text)?;
    let has_data = body.get("data").is_some_and(|d| !d.is_null());
    if !has_data {
        if let Some(err) = parse::graphql_errors(&body) {
            return Err(err);
        }
    }
    Ok(body)
}

/// Accept a bare tweet id or an x.com/twitter.com status URL.
pub fn tweet_id_from_input(input: &str) -> Result<String> {
    let input = input.trim();
    let candidate = match input.split_once("/status/") {
        Some((_, rest)) => rest
            .split(&['/', '?', '#'][..])
            .next()
            .unwrap_or(""),
        None => input,
    };
    if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit()) {
        Ok(candidate.to_string())
    } else {
        Err(TwitterError::InvalidInput(format!(
            "'{}' is not a tweet id or status URL",
            input
        )))
    }
}

/// Strip a leading `@` and any x.com profile URL prefix.
pub fn normalize_handle(input: &str) -> String {
    let input = input.trim();
    let path = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))
        .unwrap_or(input);
    let path = path.strip_prefix("www.").unwrap_or(path);
    let path = path
        .strip_prefix("x.com/")
        .or_else(|| path.strip_prefix("twitter.com/"))
        .unwrap_or(path);
    path.split('/')
        .next()
        .unwrap_or("")
        .trim_start_matches('@')
        .to_string()
}
