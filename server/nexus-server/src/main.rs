//! `nexus-server` entrypoint: parses CLI args, loads and validates
//! configuration, then runs the supervisor until `ctrl_c` or a fatal error.
//! Exit codes per §6: 0 clean shutdown, 1 config/init failure, 2 fatal
//! runtime error.

mod cli;
mod dispatch;
mod listener;
mod state;
mod supervisor;
mod sweepers;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use nexus_core::config::Config;
use supervisor::Supervisor;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let raw = match std::fs::read_to_string(&cli.config) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(path = %cli.config, error = %e, "failed to read config file");
            return ExitCode::from(1);
        }
    };

    let config = match Config::from_yaml(&raw) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "failed to parse config file");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "config validation failed");
        return ExitCode::from(1);
    }

    if cli.validate {
        tracing::info!("config is valid");
        return ExitCode::SUCCESS;
    }

    let supervisor = match Supervisor::start(&config, cli.database_url.as_deref()).await {
        Ok(supervisor) => supervisor,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            return ExitCode::from(1);
        }
    };

    tracing::info!(server = %config.server.name, "dmr-nexus running");

    let token = supervisor.token();
    let run = tokio::spawn(supervisor.run_until_shutdown());

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to listen for ctrl_c, shutting down anyway");
            }
            tracing::info!("shutdown signal received");
            token.cancel();
        }
    }

    match run.await {
        Ok(Ok(())) => {
            tracing::info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "server exited with a fatal error");
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!(error = %e, "supervisor task panicked");
            ExitCode::from(2)
        }
    }
}
