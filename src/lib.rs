//! bird: read and post on X/Twitter through the web GraphQL API using the
//! session cookies of a logged-in browser.

pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod output;
pub mod server;
pub mod twitter;

pub use error::{Result, TwitterError};
pub use twitter::{ClientOptions, TwitterClient};
