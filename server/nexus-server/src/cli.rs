use clap::Parser;

/// `--config <path>` / `--validate` / `--version` per the external-interfaces
/// CLI contract. Exit codes are assigned in `main`: 0 clean, 1 config/init
/// failure, 2 fatal runtime error.
#[derive(Parser, Debug, Clone)]
#[command(name = "nexus-server", version, about = "DMR-Nexus conference-bridge server")]
pub struct Cli {
    #[arg(long, default_value = "config.yaml")]
    pub config: String,

    /// Parse the configuration file and exit without binding any sockets.
    #[arg(long, default_value_t = false)]
    pub validate: bool,

    /// Postgres connection string for the transmission store. Falls back to
    /// an in-memory store when unset, matching `SqlxTransmissionStore`'s
    /// optional role in the persistence interface (§6).
    #[arg(long, env = "NEXUS_DATABASE_URL")]
    pub database_url: Option<String>,
}
