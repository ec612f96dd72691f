//! # bucket-upload CLI Interface
//!
//! Flags and environment variables of the plugin, and the [`run`] entrypoint
//! used by `main` and by integration tests. Every flag can also be set through
//! the environment variable shown in `--help`, which is how CI systems pass
//! plugin settings.
//!
//! All upload logic lives in `bucket-upload-core`; this module only wires
//! configuration, credentials and the storage session together.

use anyhow::Result;
use bucket_upload_core::contract::StorageSession;
use bucket_upload_core::glob::FsGlob;
use bucket_upload_core::upload::{upload_all, UploadReport};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};

use crate::access::parse_access;
use crate::load_config::load_config;
use crate::storage::{ObjectStoreProject, SESSION_DEADLINE};

/// Upload files matching a glob pattern to an object storage bucket.
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "bucket-upload",
    version,
    about = "Upload files matching a glob pattern to an object storage bucket"
)]
pub struct Cli {
    /// Log which files would be uploaded without uploading them
    #[clap(
        long = "dry-run",
        env = "DRY_RUN",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub dry_run: bool,

    /// Serialized access grant (JSON document with endpoint and keys)
    #[clap(long = "plugin-access", env = "PLUGIN_ACCESS", hide_env_values = true)]
    pub plugin_access: String,

    /// Destination bucket
    #[clap(long = "plugin-bucket", env = "PLUGIN_BUCKET")]
    pub plugin_bucket: String,

    /// Glob pattern selecting the files to upload
    #[clap(long = "plugin-source", env = "PLUGIN_SOURCE")]
    pub plugin_source: String,

    /// Glob patterns of files to leave out; repeat the flag or put one pattern per line
    #[clap(long = "plugin-exclude", env = "PLUGIN_EXCLUDE", value_delimiter = '\n')]
    pub plugin_exclude: Vec<String>,

    /// Key prefix under which files are stored
    #[clap(long = "plugin-target", env = "PLUGIN_TARGET")]
    pub plugin_target: String,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
///
/// Order matters: the access blob is parsed before the session is opened,
/// and both happen before any glob is evaluated. The session is closed on
/// every path once it has been opened.
pub async fn run(cli: Cli) -> Result<UploadReport> {
    tracing::info!("trace_initialised");

    let config = load_config(cli)?;
    config.upload.trace_loaded();

    let grant = parse_access(&config.access)?;
    let project =
        ObjectStoreProject::open_with_deadline(grant, &config.upload.bucket, SESSION_DEADLINE)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, bucket = %config.upload.bucket, "unable to open project");
                e
            })?;

    let result = upload_all(&config.upload, &FsGlob, &project).await;
    project.close().await;

    let report = result?;
    tracing::info!(
        uploaded = report.uploaded(),
        skipped = report.skipped(),
        dry_run = report.dry_run(),
        bytes = report.bytes(),
        "Upload complete"
    );
    Ok(report)
}
