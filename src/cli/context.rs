//! Command execution context
//!
//! Resolves configuration (flag > env > config file > default), builds the
//! API client and opens the result cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use vone::cache::{self, CachedSandbox, ResultCache};
use vone::client::{AdaptiveRateLimiter, TransportModifier, VOneClient};
use vone::config::Config;
use vone::error::Result;

use crate::cli::Cli;

/// Config file location: `--config`/`VONE_CONFIG` or the default
pub fn config_path(cli: &Cli) -> Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Config::default_path(),
    }
}

/// Configuration file merged with command line overrides
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let path = config_path(cli)?;
    let mut config = Config::load_or_default(&path)?;
    debug!("Configuration from {}", path.display());

    if let Some(domain) = &cli.domain {
        config.domain = Some(domain.clone());
    }
    if let Some(token) = &cli.token {
        config.token = Some(token.clone());
    }
    if let Some(cache) = &cli.cache {
        config.cache_path = Some(cache.clone());
    }
    Ok(config)
}

/// Record `domain` in the config file at `path`.
///
/// Only the file's own contents are rewritten; command line overrides such
/// as `--token` are not persisted.
pub fn persist_domain(path: &Path, domain: &str) -> Result<()> {
    let mut stored = Config::load_or_default(path)?;
    stored.domain = Some(domain.to_string());
    stored.save_to(path)?;
    info!("Saved domain {} to {}", domain, path.display());
    Ok(())
}

/// Cache database location for this run
pub fn cache_path(config: &Config) -> Result<PathBuf> {
    match &config.cache_path {
        Some(path) => Ok(path.clone()),
        None => Ok(cache::default_path()?),
    }
}

/// Cancellation token fired by Ctrl-C
pub fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let fire = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupted");
            fire.cancel();
        }
    });
    token
}

/// Everything a network command needs
pub struct CommandContext {
    pub config: Config,
    pub sandbox: CachedSandbox,
    pub ctx: CancellationToken,
}

impl CommandContext {
    /// Load config, validate credentials and build the client.
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = resolve_config(cli)?;
        let token = config.require_token()?.to_string();
        let domain = match (config.domain.as_deref(), cli.api_host.as_deref()) {
            (Some(domain), _) if !domain.is_empty() => domain.to_string(),
            (_, Some(host)) => host.to_string(),
            _ => config.require_domain()?.to_string(),
        };

        let ctx = interrupt_token();
        let mut client = VOneClient::new(domain, token)?;
        if let Some(host) = &cli.api_host {
            client = client.with_base_url(host.clone());
        }
        if config.rate_limit {
            client.set_rate_limiter(Arc::new(AdaptiveRateLimiter::for_vision_one(Some(
                ctx.clone(),
            ))));
        }
        if let Some(modifier) = proxy_modifier(&config)? {
            client.add_transport_modifier(modifier)?;
        }

        let cache = if cli.no_cache {
            None
        } else {
            Some(ResultCache::open(&cache_path(&config)?)?)
        };

        Ok(Self {
            config,
            sandbox: CachedSandbox::new(client, cache),
            ctx,
        })
    }

    pub fn client(&self) -> &VOneClient {
        self.sandbox.client()
    }
}

pub fn proxy_modifier(config: &Config) -> Result<Option<TransportModifier>> {
    config
        .proxy
        .clone()
        .map(|proxy| proxy.into_modifier())
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;
    use vone::error::{ConfigError, Error};

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["vone"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_flags_override_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "domain: file.example\ntoken: file-token\n").unwrap();

        let config = resolve_config(&cli(&[
            "check",
            "--config",
            path.to_str().unwrap(),
            "--token",
            "flag-token",
        ]))
        .unwrap();
        assert_eq!(config.domain.as_deref(), Some("file.example"));
        assert_eq!(config.token.as_deref(), Some("flag-token"));
    }

    #[test]
    fn test_cache_flag_wins() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("c.sqlite3");
        let config = resolve_config(&cli(&[
            "cache",
            "count",
            "--config",
            dir.path().join("absent.yaml").to_str().unwrap(),
            "--cache",
            db.to_str().unwrap(),
        ]))
        .unwrap();
        assert_eq!(cache_path(&config).unwrap(), db);
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let dir = TempDir::new().unwrap();
        let mut parsed = cli(&[
            "check",
            "--config",
            dir.path().join("absent.yaml").to_str().unwrap(),
        ]);
        parsed.token = None;
        match CommandContext::new(&parsed) {
            Err(Error::Config(ConfigError::MissingToken)) => {}
            Err(other) => panic!("Expected MissingToken, got {:?}", other),
            Ok(_) => panic!("Expected MissingToken"),
        }
    }

    #[test]
    fn test_persist_domain_keeps_file_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "token: file-token\npoll_interval_secs: 5\n").unwrap();

        persist_domain(&path, "api.eu.xdr.trendmicro.com").unwrap();

        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.domain.as_deref(), Some("api.eu.xdr.trendmicro.com"));
        assert_eq!(saved.token.as_deref(), Some("file-token"));
        assert_eq!(saved.poll_interval_secs, 5);
    }

    #[test]
    fn test_persist_domain_creates_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new").join("config.yaml");

        persist_domain(&path, "api.xdr.trendmicro.co.jp").unwrap();

        let saved = Config::load_from(&path).unwrap();
        assert_eq!(saved.domain.as_deref(), Some("api.xdr.trendmicro.co.jp"));
        assert!(saved.token.is_none());
    }
}
