use std::path::PathBuf;

use clap::Args;
use reclaimkit_core::{defaults, serializer};
use serde_json::json;

use super::read_input;
use crate::Cli;

/// Options of `reclaimkit inspect`.
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Exported request, `-` for stdin
    pub request: PathBuf,
}

pub fn run(cli: &Cli, cmd: &InspectCommand) -> eyre::Result<()> {
    let request = serializer::import(&read_input(&cmd.request)?)?;
    let config = cli.network_config();

    let summary = json!({
        "applicationId": request.app_id().to_checksum(None),
        "providerId": request.provider_id().as_str(),
        "timestamp": request.timestamp_ms(),
        "sessionId": request.session_id().map(ToString::to_string),
        "context": request.context(),
        "parameters": request.parameters(),
        "redirectUrl": request.endpoints().redirect_url,
        "appCallbackUrl": request.endpoints().app_callback_url,
        "signature": request.signature_hex(),
        "sdkVersion": defaults::SDK_VERSION,
        "requestUrl": request.to_request_url_with_base(&config.share_url)?,
        "appClipUrl": request.to_request_url_with_base(&config.app_clip_url)?,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
