//! Sandbox commands

use std::path::Path;

use log::info;
use serde_json::json;

use vone::client::api::{ListAnalysisResults, ListSubmissions, SubmitFile};
use vone::client::detect_domain;
use vone::error::Result;

use crate::cli::context::{
    config_path, interrupt_token, persist_domain, proxy_modifier, resolve_config,
};
use crate::cli::{Cli, CommandContext, ListArgs};
use crate::output::print_json;

pub async fn check(cli: &Cli) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let connectivity = cmd.client().check_connection(&cmd.ctx).await?;
    print_json(&connectivity)
}

pub async fn quota(cli: &Cli) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let reserve = cmd.client().daily_reserve(&cmd.ctx).await?;
    print_json(&reserve)
}

/// Only the token is needed here; the domain is what we are looking for.
pub async fn detect(cli: &Cli, save: bool) -> Result<()> {
    let config = resolve_config(cli)?;
    let token = config.require_token()?;
    let modifier = proxy_modifier(&config)?;

    let domain = detect_domain(&interrupt_token(), token, modifier).await?;
    info!("Detected domain {}", domain);
    if save {
        persist_domain(&config_path(cli)?, &domain)?;
    }
    print_json(&json!({ "domain": domain, "saved": save }))
}

pub async fn submit(cli: &Cli, file: &Path, no_wait: bool) -> Result<()> {
    let cmd = CommandContext::new(cli)?;

    if no_wait {
        let request = SubmitFile::new().with_path(file).await?;
        let (response, headers) = cmd.client().submit_file(&cmd.ctx, request).await?;
        return print_json(&json!({ "submission": response, "quota": headers }));
    }

    let result = cmd
        .sandbox
        .analyze_file(&cmd.ctx, file, cmd.config.poll_settings())
        .await?;
    print_json(&result)
}

pub async fn submit_urls(cli: &Cli, urls: &[String]) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let (results, headers) = cmd
        .client()
        .submit_urls(&cmd.ctx, urls.iter().cloned())
        .await?;
    print_json(&json!({ "results": results, "quota": headers }))
}

pub async fn status(cli: &Cli, id: &str) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let status = cmd.client().submission_status(&cmd.ctx, id).await?;
    print_json(&status)
}

pub async fn results(cli: &Cli, id: &str, suspicious_objects: bool) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let result = cmd.client().analysis_results(&cmd.ctx, id).await?;
    if !suspicious_objects {
        return print_json(&result);
    }
    let objects = cmd.client().suspicious_objects(&cmd.ctx, id).await?;
    print_json(&json!({ "result": result, "suspiciousObjects": objects }))
}

pub async fn report(cli: &Cli, id: &str, out: &Path, investigation_package: bool) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let written = if investigation_package {
        cmd.client()
            .download_investigation_package(&cmd.ctx, id, out)
            .await?
    } else {
        cmd.client().download_report(&cmd.ctx, id, out).await?
    };
    print_json(&json!({ "path": out.display().to_string(), "bytes": written }))
}

pub async fn submissions(cli: &Cli, args: &ListArgs) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let mut request = ListSubmissions::new();
    if let Some(filter) = &args.filter {
        request = request.filter(filter.clone());
    }
    if let Some(top) = args.top {
        request = request.top(top);
    }
    let items = cmd.client().list_submissions(&cmd.ctx, request).await?;
    print_json(&items)
}

pub async fn analyses(cli: &Cli, args: &ListArgs) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let mut request = ListAnalysisResults::new();
    if let Some(filter) = &args.filter {
        request = request.filter(filter.clone());
    }
    if let Some(top) = args.top {
        request = request.top(top);
    }
    let items = cmd.client().list_analysis_results(&cmd.ctx, request).await?;
    print_json(&items)
}
