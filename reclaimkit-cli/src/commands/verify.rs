use std::path::PathBuf;

use alloy_primitives::Address;
use clap::Args;
use reclaimkit_core::{
    config::ValidatorConfig, proof::parse_callback_body, serializer, validator::WitnessSet,
    ProofValidator,
};

use super::read_input;

/// Options of `reclaimkit verify`.
#[derive(Args, Debug)]
pub struct VerifyCommand {
    /// Exported request the proof answers
    #[arg(long)]
    pub request: PathBuf,

    /// Proof as delivered to the callback endpoint, `-` for stdin
    pub proof: PathBuf,

    /// Address of a witness that must have signed the claim, repeatable
    #[arg(long = "witness", required = true)]
    pub witnesses: Vec<Address>,

    /// Accepted clock drift in seconds
    #[arg(long, default_value_t = ValidatorConfig::default().max_clock_skew_secs)]
    pub max_clock_skew_secs: u64,

    /// Maximum claim age in seconds
    #[arg(long, default_value_t = ValidatorConfig::default().max_proof_age_secs)]
    pub max_proof_age_secs: u64,
}

pub fn run(cmd: &VerifyCommand) -> eyre::Result<()> {
    let request = serializer::import(&read_input(&cmd.request)?)?;
    let proofs = parse_callback_body(&read_input(&cmd.proof)?)?;

    let validator = ProofValidator::with_config(
        WitnessSet::new(cmd.witnesses.clone()),
        ValidatorConfig {
            max_clock_skew_secs: cmd.max_clock_skew_secs,
            max_proof_age_secs: cmd.max_proof_age_secs,
        },
    );
    let claims = validator.validate_all(&proofs, &request)?;

    for claim in &claims {
        tracing::info!(identifier = %claim.identifier, owner = %claim.owner, "proof accepted");
    }
    println!("{}", serde_json::to_string_pretty(&claims)?);
    Ok(())
}
