//! Vision One sandbox API client
//!
//! Typed request builders dispatched through [`client::VOneClient`], an
//! adaptive rate limiter, cursor pagination and a SQLite result cache that
//! lets repeat analyses of the same sample skip the network.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;

pub use cache::{CachedSandbox, PollSettings, ResultCache};
pub use client::VOneClient;
pub use config::Config;
pub use error::{ApiError, Error, ErrorCode, Result};
