//! Vision One API client
//!
//! [`VOneClient::execute`] runs any [`ApiRequest`] through the optional
//! [`RateLimiter`] and the dispatch engine. Endpoint builders live in
//! [`api`], list endpoints are walked with [`Paginator`].

pub mod api;
pub mod detect;
mod detections;
pub mod models;
pub mod pagination;
pub mod rate_limit;
pub mod request;
mod sandbox;
pub mod transport;
pub mod vone;

pub use detect::{REGIONAL_DOMAINS, detect_domain};
pub use pagination::{PaginatedRequest, Paginator};
pub use rate_limit::{AdaptiveRateLimiter, RateLimiter, Verdict, is_too_many_requests};
pub use request::{ApiRequest, RequestBase, RequestBody};
pub use transport::{ProxyAuth, ProxyConfig, TransportModifier};
pub use vone::VOneClient;
