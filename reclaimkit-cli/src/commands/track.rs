use std::{path::PathBuf, sync::Arc};

use alloy_primitives::Address;
use clap::Args;
use eyre::Context as _;
use reclaimkit_core::{
    config::PollingConfig, serializer, validator::WitnessSet, ProofValidator, ReclaimError,
    SessionOutcome, SessionTracker,
};
use tokio_util::sync::CancellationToken;

use super::read_input;
use crate::Cli;

/// Options of `reclaimkit track`.
#[derive(Args, Debug)]
pub struct TrackCommand {
    /// Exported request, `-` for stdin
    pub request: PathBuf,

    /// Address of a witness that must have signed the claim, repeatable
    #[arg(long = "witness", required = true)]
    pub witnesses: Vec<Address>,

    /// Delay between two status polls in milliseconds
    #[arg(long, default_value_t = PollingConfig::default().interval_ms)]
    pub interval_ms: u64,

    /// Polls before the session is considered expired
    #[arg(long, default_value_t = PollingConfig::default().max_polls)]
    pub max_polls: u32,
}

impl TrackCommand {
    fn polling(&self) -> Result<PollingConfig, ReclaimError> {
        PollingConfig::new(self.interval_ms, self.max_polls)
    }
}

pub async fn run(cli: &Cli, cmd: &TrackCommand) -> eyre::Result<()> {
    let polling = cmd.polling()?;
    let request = serializer::import(&read_input(&cmd.request)?)?;
    let backend = cli.backend()?;
    let validator = Arc::new(ProofValidator::new(WitnessSet::new(cmd.witnesses.clone())));

    let mut tracker = if request.session_id().is_some() {
        SessionTracker::resume(request, backend, validator, polling)?
    } else {
        SessionTracker::new(request, backend, validator, polling)
    };
    eprintln!("{}", tracker.request_url().await?);
    tracing::info!(status_url = %tracker.status_url().await?, "waiting for proof");

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let outcome = tracker
        .run(&cancel)
        .await
        .context("while tracking session")?;
    match outcome {
        SessionOutcome::Verified(proofs) => {
            println!("{}", serde_json::to_string_pretty(&proofs)?);
            Ok(())
        }
        SessionOutcome::Failed(reason) => eyre::bail!("session failed: {reason}"),
        SessionOutcome::Expired => eyre::bail!("session expired without a proof"),
    }
}
