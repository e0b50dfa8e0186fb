//! Result cache management commands

use chrono::{Duration, Utc};
use serde_json::json;

use vone::cache::ResultCache;
use vone::client::models::time;
use vone::error::Result;

use crate::cli::context::{cache_path, resolve_config};
use crate::cli::{CacheCommands, Cli};
use crate::output::print_json;

pub fn run(cli: &Cli, command: &CacheCommands) -> Result<()> {
    let config = resolve_config(cli)?;
    let cache = ResultCache::open(&cache_path(&config)?)?;

    match command {
        CacheCommands::Count => print_json(&cache.count()?),
        CacheCommands::List => list(&cache),
        CacheCommands::Delete { sha1 } => {
            let deleted = cache.delete(sha1)?;
            print_json(&json!({ "sha1": sha1.to_uppercase(), "deleted": deleted }))
        }
        CacheCommands::Cleanup { older_than_days } => {
            let before = Utc::now() - Duration::days(i64::from(*older_than_days));
            let removed = cache.cleanup(before)?;
            print_json(&json!({ "before": time::format(&before), "removed": removed }))
        }
    }
}

fn list(cache: &ResultCache) -> Result<()> {
    let mut rows = Vec::new();
    cache.iterate(|cached| {
        rows.push(json!({
            "updated": time::format(&cached.updated),
            "result": cached.result,
        }));
        Ok::<(), std::convert::Infallible>(())
    })?;
    print_json(&rows)
}
