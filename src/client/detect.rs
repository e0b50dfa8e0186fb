//! Regional API domain auto-detection
//!
//! A token is valid in exactly one region. Every regional endpoint is asked
//! for a connectivity check at once; the first one that accepts the token
//! wins and the rest are abandoned.

use futures::stream::{FuturesUnordered, StreamExt};
use log::debug;
use tokio_util::sync::CancellationToken;

use super::api::CheckConnection;
use super::transport::TransportModifier;
use super::vone::VOneClient;
use crate::error::{Error, Result};

/// Region name and API domain
pub const REGIONAL_DOMAINS: [(&str, &str); 6] = [
    ("Australia", "api.au.xdr.trendmicro.com"),
    ("India", "api.in.xdr.trendmicro.com"),
    ("Japan", "api.xdr.trendmicro.co.jp"),
    ("Singapore", "api.sg.xdr.trendmicro.com"),
    ("United States", "api.xdr.trendmicro.com"),
    ("Europe", "api.eu.xdr.trendmicro.com"),
];

/// Find the API domain that accepts `token`.
pub async fn detect_domain(
    ctx: &CancellationToken,
    token: &str,
    modifier: Option<TransportModifier>,
) -> Result<String> {
    let candidates = REGIONAL_DOMAINS
        .iter()
        .map(|(_, domain)| (domain.to_string(), format!("https://{}", domain)))
        .collect();
    detect_among(ctx, token, modifier, candidates).await
}

/// Race a connectivity check over `(domain, base_url)` candidates.
pub(crate) async fn detect_among(
    ctx: &CancellationToken,
    token: &str,
    modifier: Option<TransportModifier>,
    candidates: Vec<(String, String)>,
) -> Result<String> {
    let race = ctx.child_token();
    let mut pending = FuturesUnordered::new();

    for (domain, base_url) in candidates {
        let mut client = VOneClient::new(domain.clone(), token)?.with_base_url(base_url);
        if let Some(modifier) = &modifier {
            client.add_transport_modifier(modifier.clone())?;
        }
        let race = race.clone();
        pending.push(async move {
            let mut request = CheckConnection::new();
            let result = client.execute(&race, &mut request).await;
            (domain, result)
        });
    }

    let mut first_failure = None;
    while let Some((domain, result)) = pending.next().await {
        match result {
            Ok(()) => {
                debug!("Token accepted by {}", domain);
                race.cancel();
                return Ok(domain);
            }
            Err(Error::Api(err)) => {
                // Wrong region
                debug!("{}: {}", domain, err);
            }
            Err(err) => {
                debug!("{}: {}", domain, err);
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            }
        }
    }

    if ctx.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Err(first_failure.unwrap_or(Error::DomainNotDetected))
}
