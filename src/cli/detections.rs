//! Workbench, OAT and endpoint inventory commands

use vone::client::api::{ListAlerts, ListEndpoints, ListHighRiskDevices, ListOatDetections};
use vone::client::models::{Top, TopXm};
use vone::error::Result;

use crate::cli::{Cli, CommandContext, ListArgs, WindowArgs};
use crate::output::print_json;

pub async fn alerts(cli: &Cli, window: &WindowArgs) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let mut request = ListAlerts::new();
    if let Some(filter) = &window.filter {
        request = request.filter(filter.clone());
    }
    if let Some(start) = window.start {
        request = request.start_date_time(start);
    }
    if let Some(end) = window.end {
        request = request.end_date_time(end);
    }
    let items = cmd.client().list_alerts(&cmd.ctx, request).await?;
    print_json(&items)
}

/// The window applies to detection time.
pub async fn oat(cli: &Cli, window: &WindowArgs, top: Option<Top>) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let mut request = ListOatDetections::new();
    if let Some(filter) = &window.filter {
        request = request.filter(filter.clone());
    }
    if let Some(start) = window.start {
        request = request.detected_start(start);
    }
    if let Some(end) = window.end {
        request = request.detected_end(end);
    }
    if let Some(top) = top {
        request = request.top(top);
    }
    let items = cmd.client().oat_detections(&cmd.ctx, request).await?;
    print_json(&items)
}

pub async fn endpoints(cli: &Cli, args: &ListArgs) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let mut request = ListEndpoints::new();
    if let Some(filter) = &args.filter {
        request = request.filter(filter.clone());
    }
    if let Some(top) = args.top {
        request = request.top(top);
    }
    let items = cmd.client().list_endpoints(&cmd.ctx, request).await?;
    print_json(&items)
}

pub async fn high_risk_devices(cli: &Cli, filter: Option<&str>, top: Option<TopXm>) -> Result<()> {
    let cmd = CommandContext::new(cli)?;
    let mut request = ListHighRiskDevices::new();
    if let Some(filter) = filter {
        request = request.filter(filter);
    }
    if let Some(top) = top {
        request = request.top(top);
    }
    let items = cmd.client().high_risk_devices(&cmd.ctx, request).await?;
    print_json(&items)
}
