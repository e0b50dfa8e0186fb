//! CLI command definitions and handlers

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use vone::client::models::{Top, TopXm, time};

pub mod cache;
pub mod context;
pub mod detections;
pub mod sandbox;

pub use context::CommandContext;

/// vone - Vision One sandbox client
#[derive(Parser, Debug)]
#[command(name = "vone")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Override config file location
    #[arg(long, global = true, env = "VONE_CONFIG", hide_env = true)]
    pub config: Option<PathBuf>,

    /// Vision One API domain (e.g. api.eu.xdr.trendmicro.com)
    #[arg(long, global = true, env = "VONE_DOMAIN", hide_env = true)]
    pub domain: Option<String>,

    /// Vision One API token
    #[arg(
        long,
        global = true,
        env = "VONE_TOKEN",
        hide_env = true,
        hide_env_values = true
    )]
    pub token: Option<String>,

    /// Override result cache location
    #[arg(long, global = true, env = "VONE_CACHE", hide_env = true)]
    pub cache: Option<PathBuf>,

    /// Bypass the result cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Enable debug logging
    #[arg(long, global = true, env = "VONE_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Custom API base URL for development/testing
    #[arg(long, global = true, env = "VONE_API_HOST", hide = true)]
    pub api_host: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check connectivity and token validity
    Check,

    /// Show today's submission quota
    Quota,

    /// Find the regional API domain that accepts the token
    DetectDomain {
        /// Write the detected domain to the config file
        #[arg(long)]
        save: bool,
    },

    /// Analyze a file, reusing cached results when possible
    Submit {
        /// File to analyze
        file: PathBuf,

        /// Print the submission and return without waiting for the analysis
        #[arg(long)]
        no_wait: bool,
    },

    /// Submit URLs for analysis
    SubmitUrl {
        /// URLs to analyze
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Show the status of a submission
    Status {
        /// Submission ID
        id: String,
    },

    /// Show the analysis results of a submission
    Results {
        /// Submission ID
        id: String,

        /// Also list suspicious objects found by the analysis
        #[arg(long)]
        suspicious_objects: bool,
    },

    /// Download an analysis report
    Report {
        /// Analysis ID
        id: String,

        /// Output file
        out: PathBuf,

        /// Download the investigation package instead of the PDF report
        #[arg(long)]
        investigation_package: bool,
    },

    /// List submissions
    Submissions(ListArgs),

    /// List analysis results
    Analyses(ListArgs),

    /// List workbench alerts
    Alerts(WindowArgs),

    /// List observed attack technique detections
    Oat {
        #[command(flatten)]
        window: WindowArgs,

        /// Page size (50, 100, 200, 500 or 1000)
        #[arg(long, value_parser = parse_top)]
        top: Option<Top>,
    },

    /// List endpoints known to endpoint security
    Endpoints(ListArgs),

    /// List devices with a high risk score
    HighRiskDevices {
        /// Filter expression passed to the API
        #[arg(long)]
        filter: Option<String>,

        /// Page size (10, 50, 100, 200 or 1000)
        #[arg(long, value_parser = parse_top_xm)]
        top: Option<TopXm>,
    },

    /// Manage the local result cache
    #[command(subcommand)]
    Cache(CacheCommands),
}

/// Filters shared by list commands
#[derive(Debug, Clone, Args, Default)]
pub struct ListArgs {
    /// Filter expression passed to the API
    #[arg(long)]
    pub filter: Option<String>,

    /// Page size (50, 100, 200, 500 or 1000)
    #[arg(long, value_parser = parse_top)]
    pub top: Option<Top>,
}

/// Filter and time window shared by detection listings
#[derive(Debug, Clone, Args, Default)]
pub struct WindowArgs {
    /// Filter expression passed to the API
    #[arg(long)]
    pub filter: Option<String>,

    /// Earliest time, e.g. 2024-01-01T00:00:00Z
    #[arg(long, value_parser = parse_time)]
    pub start: Option<DateTime<Utc>>,

    /// Latest time
    #[arg(long, value_parser = parse_time)]
    pub end: Option<DateTime<Utc>>,
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    time::parse(s).ok_or_else(|| format!("{} is not a time like 2024-01-01T00:00:00Z", s))
}

fn parse_top_xm(s: &str) -> Result<TopXm, String> {
    s.parse::<usize>()
        .ok()
        .and_then(TopXm::from_usize)
        .ok_or_else(|| format!("{} is not one of 10, 50, 100, 200, 1000", s))
}

fn parse_top(s: &str) -> Result<Top, String> {
    s.parse::<usize>()
        .ok()
        .and_then(Top::from_usize)
        .ok_or_else(|| format!("{} is not one of 50, 100, 200, 500, 1000", s))
}

/// Result cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Print the number of cached results
    Count,

    /// Print every cached result
    List,

    /// Remove one cached result
    Delete {
        /// SHA-1 of the sample
        sha1: String,
    },

    /// Remove results older than the given age
    Cleanup {
        #[arg(long)]
        older_than_days: u32,
    },
}
