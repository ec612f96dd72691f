use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Immutable run configuration, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Destination bucket name.
    pub bucket: String,
    /// Include glob pattern.
    pub source: String,
    /// Exclude glob patterns, evaluated independently.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Destination key prefix.
    pub target: String,
    /// Log what would be uploaded without transferring anything.
    #[serde(default)]
    pub dry_run: bool,
}

impl UploadConfig {
    pub fn trace_loaded(&self) {
        info!(
            bucket = %self.bucket,
            source = %self.source,
            exclude_count = self.exclude.len(),
            target = %self.target,
            dry_run = self.dry_run,
            "Loaded UploadConfig"
        );
        debug!(?self, "UploadConfig loaded (full debug)");
    }
}
