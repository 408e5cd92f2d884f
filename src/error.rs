use thiserror::Error;

/// Errors surfaced by the X/Twitter client.
#[derive(Debug, Error)]
pub enum TwitterError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error: {}", .messages.join("; "))]
    Api {
        messages: Vec<String>,
        codes: Vec<i64>,
    },

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TwitterError {
    /// The "automated request" rejection the legacy posting endpoint works around.
    pub fn is_automation_block(&self) -> bool {
        matches!(self, TwitterError::Api { codes, .. } if codes.contains(&226))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TwitterError::Status { status: 404, .. })
    }

    /// Build a status error keeping only the first part of a (possibly HTML) body.
    pub fn status(status: u16, body: &str) -> Self {
        let body: String = body.chars().take(200).collect();
        TwitterError::Status { status, body }
    }
}

pub type Result<T> = std::result::Result<T, TwitterError>;

/// Errors from reading a single browser cookie store.
#[derive(Debug, Error)]
pub enum CookieError {
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("cookie store not found at {0}")]
    NotFound(String),

    #[error("no profile found for {0}")]
    NoProfile(&'static str),

    #[error("failed to read cookie database: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decrypt cookie: {0}")]
    Decrypt(String),

    #[error("malformed cookie file: {0}")]
    Malformed(String),

    #[error("auth_token/ct0 not present")]
    Missing,
}
