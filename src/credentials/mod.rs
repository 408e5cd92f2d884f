//! Session cookie resolution.
//!
//! Tokens are looked up per token with the precedence CLI argument, then
//! environment variable, then the first browser cookie store that holds both
//! `auth_token` and `ct0` for x.com (or twitter.com).

pub mod chrome;
pub mod firefox;
pub mod safari;

use crate::error::CookieError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub const AUTH_TOKEN_ENV: [&str; 2] = ["AUTH_TOKEN", "TWITTER_AUTH_TOKEN"];
pub const CT0_ENV: [&str; 2] = ["CT0", "TWITTER_CT0"];

/// Hosts whose cookies authenticate against the web API, most preferred first.
const COOKIE_HOSTS: [&str; 4] = [".x.com", "x.com", ".twitter.com", "twitter.com"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookies {
    pub auth_token: Option<String>,
    pub ct0: Option<String>,
    pub cookie_header: Option<String>,
    pub source: Option<String>,
}

impl Cookies {
    pub fn is_complete(&self) -> bool {
        self.auth_token.is_some() && self.ct0.is_some()
    }

    fn with_header(mut self) -> Self {
        self.cookie_header = match (&self.auth_token, &self.ct0) {
            (Some(auth), Some(ct0)) => Some(format!("auth_token={}; ct0={}", auth, ct0)),
            _ => None,
        };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum CookieSource {
    Safari,
    Chrome,
    Firefox,
}

impl CookieSource {
    /// Safari only exists on macOS.
    pub fn platform_defaults() -> Vec<CookieSource> {
        if cfg!(target_os = "macos") {
            vec![CookieSource::Safari, CookieSource::Chrome, CookieSource::Firefox]
        } else {
            vec![CookieSource::Chrome, CookieSource::Firefox]
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CookieSource::Safari => "Safari",
            CookieSource::Chrome => "Chrome",
            CookieSource::Firefox => "Firefox",
        }
    }
}

impl fmt::Display for CookieSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CookieSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safari" => Ok(CookieSource::Safari),
            "chrome" => Ok(CookieSource::Chrome),
            "firefox" => Ok(CookieSource::Firefox),
            other => Err(format!("unknown cookie source: {}", other)),
        }
    }
}

/// Tokens read from one browser store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCookies {
    pub auth_token: String,
    pub ct0: String,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct CredentialOptions {
    pub auth_token: Option<String>,
    pub ct0: Option<String>,
    pub sources: Vec<CookieSource>,
    pub chrome_profile: Option<String>,
    pub firefox_profile: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CredentialResolution {
    pub cookies: Cookies,
    pub warnings: Vec<String>,
}

/// Resolve session cookies from the CLI, the environment and browser stores.
pub fn resolve_credentials(options: &CredentialOptions) -> CredentialResolution {
    resolve_with(options, &|key: &str| std::env::var(key).ok(), &read_browser)
}

fn read_browser(
    source: CookieSource,
    options: &CredentialOptions,
) -> Result<BrowserCookies, CookieError> {
    match source {
        CookieSource::Safari => safari::read_cookies(),
        CookieSource::Chrome => chrome::read_cookies(options.chrome_profile.as_deref()),
        CookieSource::Firefox => firefox::read_cookies(options.firefox_profile.as_deref()),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn from_env(env: &dyn Fn(&str) -> Option<String>, keys: &[&str]) -> Option<(String, String)> {
    keys.iter()
        .find_map(|key| non_empty(env(key)).map(|value| (value, format!("env {}", key))))
}

pub(crate) fn resolve_with(
    options: &CredentialOptions,
    env: &dyn Fn(&str) -> Option<String>,
    browser: &dyn Fn(CookieSource, &CredentialOptions) -> Result<BrowserCookies, CookieError>,
) -> CredentialResolution {
    let mut warnings = Vec::new();

    let mut auth = non_empty(options.auth_token.clone()).map(|v| (v, "CLI argument".to_string()));
    let mut ct0 = non_empty(options.ct0.clone()).map(|v| (v, "CLI argument".to_string()));

    if auth.is_none() {
        auth = from_env(env, &AUTH_TOKEN_ENV);
    }
    if ct0.is_none() {
        ct0 = from_env(env, &CT0_ENV);
    }

    if auth.is_none() || ct0.is_none() {
        for source in &options.sources {
            match browser(*source, options) {
                Ok(found) => {
                    debug!(source = %found.label, "read cookies from browser");
                    if auth.is_none() {
                        auth = Some((found.auth_token, found.label.clone()));
                    }
                    if ct0.is_none() {
                        ct0 = Some((found.ct0, found.label));
                    }
                    break;
                }
                Err(e) => {
                    debug!(source = %source, error = %e, "browser cookie lookup failed");
                    warnings.push(format!("{}: {}", source, e));
                }
            }
        }
    }

    if auth.is_none() {
        warnings.push(
            "Missing auth_token - pass --auth-token, set AUTH_TOKEN, or log into x.com in a supported browser"
                .to_string(),
        );
    }
    if ct0.is_none() {
        warnings.push(
            "Missing ct0 - pass --ct0, set CT0, or log into x.com in a supported browser"
                .to_string(),
        );
    }

    let source = match (&auth, &ct0) {
        (Some((_, a)), Some((_, c))) if a == c => Some(a.clone()),
        (Some((_, a)), Some((_, c))) => Some(format!("{} + {}", a, c)),
        (Some((_, a)), None) => Some(a.clone()),
        (None, Some((_, c))) => Some(c.clone()),
        (None, None) => None,
    };

    let cookies = Cookies {
        auth_token: auth.map(|(value, _)| value),
        ct0: ct0.map(|(value, _)| value),
        cookie_header: None,
        source,
    }
    .with_header();

    CredentialResolution { cookies, warnings }
}

/// Pick `auth_token` and `ct0` out of `(host, name, value)` rows, preferring x.com.
pub(crate) fn pick_tokens<I>(rows: I) -> Result<(String, String), CookieError>
where
    I: IntoIterator<Item = (String, String, String)>,
{
    let mut auth: Option<(usize, String)> = None;
    let mut ct0: Option<(usize, String)> = None;

    for (host, name, value) in rows {
        let Some(rank) = COOKIE_HOSTS.iter().position(|h| *h == host) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        let slot = match name.as_str() {
            "auth_token" => &mut auth,
            "ct0" => &mut ct0,
            _ => continue,
        };
        if !matches!(slot, Some((best, _)) if *best <= rank) {
            *slot = Some((rank, value));
        }
    }

    match (auth, ct0) {
        (Some((_, auth)), Some((_, ct0))) => Ok((auth, ct0)),
        _ => Err(CookieError::Missing),
    }
}

pub(crate) fn home_dir() -> Result<std::path::PathBuf, CookieError> {
    dirs::home_dir().ok_or_else(|| CookieError::NotFound("home directory".to_string()))
}

/// Open a live browser database without taking its lock.
pub(crate) fn open_immutable(path: &std::path::Path) -> Result<rusqlite::Connection, CookieError> {
    use rusqlite::OpenFlags;

    let escaped = path
        .display()
        .to_string()
        .replace('%', "%25")
        .replace('?', "%3f")
        .replace('#', "%23");
    let uri = format!("file:{}?immutable=1", escaped);
    let conn = rusqlite::Connection::open_with_flags(
        uri,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
    )?;
    Ok(conn)
}
