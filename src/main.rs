use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use cxse_server::config::{load_config, ServerConfig};
use cxse_server::lifecycle;
use cxse_server::observability::{logging, metrics};
use cxse_server::routing::Dispatch;
use cxse_server::store::MongoDriver;

/// CxSE API server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML file with tuning knobs; environment variables override it.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Validate the configuration, print a summary and exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {e}");
        }
    }

    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if args.check_config {
        print_summary(&config);
        return ExitCode::SUCCESS;
    }

    logging::init(&config.observability, config.environment);

    tracing::info!(
        bind_address = %config.listener.bind_address(),
        allowed_origins = ?config.cors.allowed_origins,
        serverless = config.deployment.serverless,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match lifecycle::run(config, Arc::new(MongoDriver::new()), Dispatch::new()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(config: &ServerConfig) {
    println!("environment:      {}", config.environment);
    println!("version:          {}", config.version);
    println!("listen:           {}", config.listener.bind_address());
    println!("serverless:       {}", config.deployment.serverless);
    println!("allowed origins:  {}", config.cors.allowed_origins.join(", "));
    println!(
        "rate limit:       {} requests / {}s (enabled: {})",
        config.rate_limit.max_requests, config.rate_limit.window_secs, config.rate_limit.enabled
    );
    println!("max body size:    {} bytes", config.security.max_body_size);
    println!(
        "static files:     {} -> {}",
        config.static_files.mount_path, config.static_files.directory
    );
    println!("store pool size:  {}", config.store.max_pool_size);
    println!("configuration OK");
}
