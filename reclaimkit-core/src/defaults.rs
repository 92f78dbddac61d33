//! Default endpoints and tuning values of the Reclaim verification network.

/// Base URL of the Reclaim backend.
pub const BACKEND_BASE_URL: &str = "https://api.reclaimprotocol.org";

/// Request front-end. The encoded request template is appended to this URL.
pub const RECLAIM_SHARE_URL: &str = "https://share.reclaimprotocol.org/verifier/?template=";

/// App Clip deep link. The encoded request template is appended to this URL.
pub const APP_CLIP_URL: &str =
    "https://appclip.apple.com/id?p=org.reclaimprotocol.app.clip&template=";

/// Version tag embedded in every request template and export.
pub const SDK_VERSION: &str = concat!("rust-", env!("CARGO_PKG_VERSION"));

/// Timeout of a single backend call.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Retries of a failed backend call; four attempts in total.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between two status polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;

/// Number of polls before a session without terminal report is considered expired.
/// Together with the interval this is a ten minute window.
pub const DEFAULT_MAX_POLLS: u32 = 200;

/// Accepted clock drift between this process and the attestors.
pub const DEFAULT_MAX_CLOCK_SKEW_SECS: u64 = 300;

/// Maximum age of a claim at validation time.
pub const DEFAULT_MAX_PROOF_AGE_SECS: u64 = 1_800;
