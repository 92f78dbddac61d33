//! `reclaimkit`: developer CLI around `reclaimkit-core`.
//!
//! Builds and signs proof requests, moves them between machines as exported text,
//! tracks their sessions and verifies proofs offline.

mod commands;

use clap::{Parser, Subcommand};
use reclaimkit_core::{config::NetworkConfig, network::ReclaimBackend, Credentials};
use secrecy::SecretString;

use commands::{inspect, request, track, verify};

/// Global options shared by every command.
#[derive(Parser, Debug)]
#[command(name = "reclaimkit", version, about)]
struct Cli {
    /// Application id issued by the Reclaim developer portal
    #[arg(long, env = "RECLAIM_APP_ID", global = true)]
    app_id: Option<String>,

    /// Application secret issued with the application id
    #[arg(long, env = "RECLAIM_APP_SECRET", hide_env_values = true, global = true)]
    app_secret: Option<SecretString>,

    /// Base URL of the Reclaim backend
    #[arg(
        long,
        env = "RECLAIM_BACKEND_URL",
        default_value = reclaimkit_core::defaults::BACKEND_BASE_URL,
        global = true
    )]
    backend_url: String,

    /// Allow a plain http backend, e.g. a local mock
    #[arg(long, env = "RECLAIM_ALLOW_INSECURE_HTTP", global = true)]
    allow_insecure_http: bool,

    /// Hand out full request URLs instead of shortened ones
    #[arg(long, global = true)]
    no_shorten: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build, sign and export a proof request
    Request(request::RequestCommand),
    /// Register an exported request and wait for its outcome
    Track(track::TrackCommand),
    /// Validate a proof against an exported request
    Verify(verify::VerifyCommand),
    /// Print the fields and URLs of an exported request
    Inspect(inspect::InspectCommand),
}

impl Cli {
    fn credentials(&self) -> eyre::Result<Credentials> {
        let app_id = self
            .app_id
            .as_deref()
            .ok_or_else(|| eyre::eyre!("--app-id or RECLAIM_APP_ID is required"))?;
        let app_secret = self
            .app_secret
            .as_ref()
            .ok_or_else(|| eyre::eyre!("--app-secret or RECLAIM_APP_SECRET is required"))?;
        Ok(Credentials::new(app_id, app_secret)?)
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            shorten_urls: !self.no_shorten,
            allow_insecure_http: self.allow_insecure_http,
            ..NetworkConfig::with_backend_url(self.backend_url.clone())
        }
    }

    fn backend(&self) -> eyre::Result<ReclaimBackend> {
        Ok(ReclaimBackend::new(self.network_config())?)
    }
}

fn install_tracing() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_default();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Command::Request(cmd) => request::run(&cli, cmd).await,
        Command::Track(cmd) => track::run(&cli, cmd).await,
        Command::Verify(cmd) => verify::run(cmd),
        Command::Inspect(cmd) => inspect::run(&cli, cmd),
    }
}
