//! vone CLI - Vision One sandbox client

use clap::Parser;
use log::LevelFilter;

mod cli;
mod output;

use cli::{Cli, Commands};
use vone::error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if debug {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match &cli.command {
        Commands::Check => cli::sandbox::check(&cli).await,
        Commands::Quota => cli::sandbox::quota(&cli).await,
        Commands::DetectDomain { save } => cli::sandbox::detect(&cli, *save).await,
        Commands::Submit { file, no_wait } => cli::sandbox::submit(&cli, file, *no_wait).await,
        Commands::SubmitUrl { urls } => cli::sandbox::submit_urls(&cli, urls).await,
        Commands::Status { id } => cli::sandbox::status(&cli, id).await,
        Commands::Results {
            id,
            suspicious_objects,
        } => cli::sandbox::results(&cli, id, *suspicious_objects).await,
        Commands::Report {
            id,
            out,
            investigation_package,
        } => cli::sandbox::report(&cli, id, out, *investigation_package).await,
        Commands::Submissions(args) => cli::sandbox::submissions(&cli, args).await,
        Commands::Analyses(args) => cli::sandbox::analyses(&cli, args).await,
        Commands::Alerts(window) => cli::detections::alerts(&cli, window).await,
        Commands::Oat { window, top } => cli::detections::oat(&cli, window, *top).await,
        Commands::Endpoints(args) => cli::detections::endpoints(&cli, args).await,
        Commands::HighRiskDevices { filter, top } => {
            cli::detections::high_risk_devices(&cli, filter.as_deref(), *top).await
        }
        Commands::Cache(command) => cli::cache::run(&cli, command),
    }
}
