//! HTTP transport customization: modifiers and proxy settings

use std::sync::Arc;

use reqwest::ClientBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Hook that adjusts the HTTP client before it is built
pub type TransportModifier = Arc<dyn Fn(ClientBuilder) -> ClientBuilder + Send + Sync>;

/// Run `first` (if any) and then `next`.
pub(crate) fn chain(first: Option<TransportModifier>, next: TransportModifier) -> TransportModifier {
    match first {
        None => next,
        Some(first) => Arc::new(move |builder| next(first(builder))),
    }
}

/// Proxy authentication scheme
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProxyAuth {
    #[default]
    None,
    Basic { username: String, password: String },
}

/// Outbound HTTP proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// e.g. `http://proxy.corp:3128`
    pub url: String,
    #[serde(default)]
    pub auth: ProxyAuth,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: ProxyAuth::None,
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = ProxyAuth::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    fn to_proxy(&self) -> std::result::Result<reqwest::Proxy, ConfigError> {
        let proxy = reqwest::Proxy::all(&self.url)
            .map_err(|e| ConfigError::Invalid(format!("proxy {}: {}", self.url, e)))?;
        Ok(match &self.auth {
            ProxyAuth::None => proxy,
            ProxyAuth::Basic { username, password } => proxy.basic_auth(username, password),
        })
    }

    /// Validate the proxy and turn it into a transport modifier.
    pub fn into_modifier(self) -> Result<TransportModifier> {
        let proxy = self.to_proxy()?;
        Ok(Arc::new(move |builder: ClientBuilder| builder.proxy(proxy.clone())))
    }
}
