//! Object storage session backed by the `object_store` S3 client.
//!
//! [`ObjectStoreProject`] is the concrete [`StorageSession`] used by the CLI.
//! It talks to any S3-compatible gateway described by an [`AccessGrant`] and
//! holds one client for the bucket it was opened on.
//!
//! Uploads are buffered into [`PART_SIZE`] parts. An object that never fills
//! a whole part is sent as a single `PUT` on commit; anything larger becomes
//! a multipart upload that is completed on commit or aborted on failure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bucket_upload_core::contract::{StorageError, StorageSession, UploadHandle};
use bucket_upload_core::Error;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ClientOptions, MultipartUpload, ObjectStore, PutPayload, RetryConfig};
use tracing::{debug, info, warn};

use crate::access::AccessGrant;

/// Upper bound on opening a project.
pub const SESSION_DEADLINE: Duration = Duration::from_secs(30);

/// Size of each multipart part. S3 requires at least 5 MiB for all but the last part.
pub const PART_SIZE: usize = 5 * 1024 * 1024;

/// Key probed when opening a project. It is never written.
const PROBE_KEY: &str = ".bucket-upload-probe";

/// An opened storage project.
pub struct ObjectStoreProject {
    bucket: String,
    store: Arc<dyn ObjectStore>,
    part_size: usize,
}

impl ObjectStoreProject {
    /// Open a project and verify the grant can reach `bucket`, giving up
    /// after `deadline`.
    pub async fn open_with_deadline(
        grant: AccessGrant,
        bucket: &str,
        deadline: Duration,
    ) -> Result<Self, Error> {
        match tokio::time::timeout(deadline, Self::open(grant, bucket)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Session(format!(
                "deadline of {}s exceeded while opening project",
                deadline.as_secs_f32()
            ))),
        }
    }

    /// Open a project and verify the grant can reach `bucket`.
    ///
    /// The check is a `HEAD` on a sentinel key: a `NotFound` answer proves
    /// the endpoint, credentials and bucket are usable.
    pub async fn open(grant: AccessGrant, bucket: &str) -> Result<Self, Error> {
        info!(endpoint = %grant.endpoint, bucket, "Opening storage project");
        let store = build_s3(&grant, bucket)
            .map_err(|e| Error::Session(format!("cannot configure client for {bucket}: {e}")))?;

        match store.head(&Path::from(PROBE_KEY)).await {
            Ok(_) | Err(object_store::Error::NotFound { .. }) => {
                info!(bucket, "Storage project opened");
                Ok(Self::with_store(bucket, Arc::new(store), PART_SIZE))
            }
            Err(e) => Err(Error::Session(format!("bucket {bucket} is not accessible: {e}"))),
        }
    }

    fn with_store(bucket: &str, store: Arc<dyn ObjectStore>, part_size: usize) -> Self {
        Self {
            bucket: bucket.to_string(),
            store,
            part_size,
        }
    }
}

fn build_s3(
    grant: &AccessGrant,
    bucket: &str,
) -> Result<object_store::aws::AmazonS3, object_store::Error> {
    let allow_http = grant.endpoint.starts_with("http://");
    AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(&grant.region)
        .with_endpoint(&grant.endpoint)
        .with_access_key_id(&grant.access_key_id)
        .with_secret_access_key(&grant.secret_access_key)
        .with_virtual_hosted_style_request(false)
        .with_client_options(
            ClientOptions::new()
                .with_allow_http(allow_http)
                .with_connect_timeout(Duration::from_secs(10)),
        )
        .with_retry(RetryConfig {
            max_retries: 0,
            ..Default::default()
        })
        .build()
}

#[async_trait]
impl StorageSession for ObjectStoreProject {
    async fn begin_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Box<dyn UploadHandle>, StorageError> {
        if bucket != self.bucket {
            return Err(format!(
                "project was opened for bucket {}, not {bucket}",
                self.bucket
            )
            .into());
        }
        let location = Path::parse(key)?;
        debug!(bucket, key, "Beginning upload");
        Ok(Box::new(ObjectStoreUpload::new(
            self.store.clone(),
            location,
            self.part_size,
        )))
    }

    async fn close(&self) {
        info!(bucket = %self.bucket, "Storage project closed");
    }
}

/// One object upload against an [`ObjectStore`].
#[derive(Debug)]
pub struct ObjectStoreUpload {
    store: Arc<dyn ObjectStore>,
    location: Path,
    part_size: usize,
    buffer: Vec<u8>,
    multipart: Option<Box<dyn MultipartUpload>>,
}

impl ObjectStoreUpload {
    pub fn new(store: Arc<dyn ObjectStore>, location: Path, part_size: usize) -> Self {
        Self {
            store,
            location,
            part_size: part_size.max(1),
            buffer: Vec::new(),
            multipart: None,
        }
    }

    async fn put_part(&mut self, part: Vec<u8>) -> Result<(), object_store::Error> {
        if self.multipart.is_none() {
            debug!(location = %self.location, "Starting multipart upload");
            self.multipart = Some(self.store.put_multipart(&self.location).await?);
        }
        if let Some(upload) = self.multipart.as_mut() {
            upload.put_part(PutPayload::from(part)).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UploadHandle for ObjectStoreUpload {
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, StorageError> {
        self.buffer.extend_from_slice(bytes);
        while self.buffer.len() >= self.part_size {
            let rest = self.buffer.split_off(self.part_size);
            let part = std::mem::replace(&mut self.buffer, rest);
            self.put_part(part).await?;
        }
        Ok(bytes.len())
    }

    async fn commit(&mut self) -> Result<(), StorageError> {
        let remaining = std::mem::take(&mut self.buffer);
        match self.multipart.as_mut() {
            None => {
                self.store
                    .put(&self.location, PutPayload::from(remaining))
                    .await?;
            }
            Some(upload) => {
                if !remaining.is_empty() {
                    upload.put_part(PutPayload::from(remaining)).await?;
                }
                upload.complete().await?;
            }
        }
        debug!(location = %self.location, "Upload committed");
        Ok(())
    }

    async fn abort(&mut self) {
        self.buffer.clear();
        if let Some(mut upload) = self.multipart.take() {
            if let Err(e) = upload.abort().await {
                warn!(location = %self.location, error = %e, "Failed to abort multipart upload");
            }
        }
    }
}
