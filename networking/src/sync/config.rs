/// Sync protocol constants and controller configuration.
///
/// The constants are fixed by the light protocol. `SyncConfig` carries the
/// controller's retry and timeout policy and can be loaded from YAML.
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use tracing::info;

/// Headers skipped between two consecutive pivots in the sparse phase.
pub const GAP: u32 = 192;

/// Upper bound on pivots collected in one start round.
pub const MAX_PIVOTS: u32 = 20;

/// Maximum headers a peer is asked for (or serves) in a single request.
pub const MAX_REQUESTED_HEADERS: u32 = 192;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_MAX_ROUNDS: u32 = 64;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// How long to wait for a header response before counting a failed attempt.
    pub request_timeout_ms: u64,
    /// Attempts per request before the session gives up on the peer.
    pub max_attempts: u32,
    /// Start/fetch rounds allowed in one session.
    pub max_rounds: u32,
    /// Cap on headers returned when serving a request.
    pub max_response_headers: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_response_headers: MAX_REQUESTED_HEADERS,
        }
    }
}

impl SyncConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open sync config {}", path.display()))?;
        let config: SyncConfig = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse sync config {}", path.display()))?;
        config.validate()?;

        info!(path = %path.display(), ?config, "Sync config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.request_timeout_ms > 0, "request_timeout_ms must be positive");
        ensure!(self.max_attempts > 0, "max_attempts must be positive");
        ensure!(self.max_rounds > 0, "max_rounds must be positive");
        ensure!(
            self.max_response_headers > 0 && self.max_response_headers <= MAX_REQUESTED_HEADERS,
            "max_response_headers must be within 1..={MAX_REQUESTED_HEADERS}"
        );
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
