use std::path::PathBuf;

use clap::Args;
use reclaimkit_core::{network, serializer, RequestDraft};

use super::{parse_pair, write_output};
use crate::Cli;

/// Options of `reclaimkit request`.
#[derive(Args, Debug)]
pub struct RequestCommand {
    /// Provider the proof is requested for
    #[arg(long)]
    pub provider: String,

    /// Context entry as ADDRESS=MESSAGE, repeatable
    #[arg(long = "context", value_parser = parse_pair)]
    pub contexts: Vec<(String, String)>,

    /// Provider parameter as NAME=VALUE, repeatable
    #[arg(long = "param", value_parser = parse_pair)]
    pub params: Vec<(String, String)>,

    /// Page the end user is sent to after submitting the proof
    #[arg(long)]
    pub redirect_url: Option<String>,

    /// Endpoint the proof is delivered to
    #[arg(long)]
    pub callback_url: Option<String>,

    /// Deliver the proof as JSON instead of a form body
    #[arg(long)]
    pub json_proof_response: bool,

    /// Accept providers that use AI extraction
    #[arg(long)]
    pub accept_ai_providers: bool,

    /// Register the session right away and print its request URL
    #[arg(long)]
    pub register: bool,

    /// Write the exported request here instead of stdout
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

pub async fn run(cli: &Cli, cmd: &RequestCommand) -> eyre::Result<()> {
    let credentials = cli.credentials()?;
    let backend = cli.backend()?;

    let mut draft = RequestDraft::create(&credentials, &cmd.provider, &backend).await?;
    for (address, message) in &cmd.contexts {
        draft.add_context(address, message)?;
    }
    draft.set_params(cmd.params.iter().cloned())?;
    if let Some(url) = &cmd.redirect_url {
        draft.set_redirect_url(url)?;
    }
    if let Some(url) = &cmd.callback_url {
        draft.set_app_callback_url(url)?;
    }
    draft.set_json_proof_response(cmd.json_proof_response);
    draft.set_accept_ai_providers(cmd.accept_ai_providers);

    let mut request = draft.finalize(&credentials)?;
    tracing::info!(
        provider_id = %request.provider_id(),
        signature = %request.signature_hex(),
        "signed proof request"
    );

    if cmd.register {
        use reclaimkit_core::VerificationNetwork as _;

        let session_id = network::start_session(&backend, &request).await?;
        request = request.with_session(session_id);
        eprintln!("{}", backend.request_url(&request).await?);
    }

    write_output(cmd.out.as_ref(), &serializer::export(&request)?)
}
