//! Engine-wide configuration.

use std::collections::HashMap;

/// Tunables for a resolve, separate from any single [`crate::types::Request`].
///
/// Mirrors the handful of settings that change the engine's behavior across
/// every request it serves, as opposed to per-request input.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `GOPROXY` to set for every toolchain invocation, if the environment's
    /// default isn't suitable (e.g. an internal module proxy).
    pub goproxy_url: Option<String>,
    /// Reject requests with a vendor directory that didn't pass a vendoring
    /// flag, instead of silently downloading dependencies anyway.
    pub gomod_strict_vendor: bool,
    /// Maximum attempts for network-shaped commands (`go mod download`,
    /// `go mod vendor`), with exponential backoff between attempts.
    pub gomod_download_max_tries: u32,
    /// Environment variable names and values reported alongside the
    /// resolved output, for callers that need to point a later build step
    /// at the merged download cache (e.g. `GOPATH`, `GOMODCACHE`).
    pub default_environment_overrides: HashMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            goproxy_url: None,
            gomod_strict_vendor: false,
            gomod_download_max_tries: 5,
            default_environment_overrides: HashMap::new(),
        }
    }
}
