/// `load_config` module: turns parsed CLI flags into the immutable run configuration.
///
/// clap already enforces that required flags are present. This module rejects
/// values that are present but blank (an empty `PLUGIN_BUCKET=` in a CI file is
/// the usual culprit), drops blank exclude entries, and separates the secret
/// access blob from the [`UploadConfig`] that is logged and passed around.
///
/// # Errors
/// Failures are returned as [`Error::Config`] naming both the flag and its
/// environment variable.
use std::fmt;

use bucket_upload_core::config::UploadConfig;
use bucket_upload_core::Error;
use tracing::{error, info};

use crate::cli::Cli;

/// Everything a run needs, split into the secret and the loggable part.
pub struct PluginConfig {
    pub access: String,
    pub upload: UploadConfig,
}

impl fmt::Debug for PluginConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginConfig")
            .field("access", &"<redacted>")
            .field("upload", &self.upload)
            .finish()
    }
}

pub fn load_config(cli: Cli) -> Result<PluginConfig, Error> {
    let access = required("--plugin-access", "PLUGIN_ACCESS", cli.plugin_access)?;
    let bucket = required("--plugin-bucket", "PLUGIN_BUCKET", cli.plugin_bucket)?;
    let source = required("--plugin-source", "PLUGIN_SOURCE", cli.plugin_source)?;
    let target = required("--plugin-target", "PLUGIN_TARGET", cli.plugin_target)?;

    let exclude: Vec<String> = cli
        .plugin_exclude
        .into_iter()
        .map(|pattern| pattern.trim().to_string())
        .filter(|pattern| !pattern.is_empty())
        .collect();

    let upload = UploadConfig {
        bucket,
        source,
        exclude,
        target,
        dry_run: cli.dry_run,
    };
    info!(bucket = %upload.bucket, dry_run = upload.dry_run, "Configuration loaded");
    Ok(PluginConfig { access, upload })
}

fn required(flag: &str, env: &str, value: String) -> Result<String, Error> {
    if value.trim().is_empty() {
        error!(flag, env, "Required configuration value is blank");
        return Err(Error::Config(format!("{flag} ({env}) must not be blank")));
    }
    Ok(value)
}
