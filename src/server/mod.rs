//! Local web server for the daily news page.

mod assets;
mod routes;

pub use routes::{parse_news_request, router, serve, AppState, NewsRequest};
