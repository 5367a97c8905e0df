//! Google Cloud Storage backend
//!
//! Built on `opendal`'s GCS service. Credentials come from a service-account
//! JSON key file; the storage class for uploaded objects is set bucket-wide
//! for the run. Objects can optionally be gzip-compressed on the way out,
//! mirroring the transcoding upload of the original tool.

use crate::{ObjectWriter, RemoteStore};
use async_compression::futures::write::GzipEncoder;
use async_trait::async_trait;
use bucketsync_types::{Error, RemoteObjectRecord, Result, WriteOptions};
use futures::io::AsyncWriteExt;
use futures::TryStreamExt;
use opendal::services::Gcs;
use opendal::{Metadata, Operator};
use std::path::PathBuf;
use tracing::{debug, info};

/// Buffer size for multipart upload chunks.
const UPLOAD_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Connection settings for a GCS bucket.
#[derive(Debug, Clone)]
pub struct GcsConfig {
    /// Bucket receiving the backup
    pub bucket: String,
    /// Google Cloud project owning the bucket (recorded for operators; the
    /// JSON API itself is bucket-scoped)
    pub project_id: String,
    /// Service-account JSON key file
    pub credential_path: PathBuf,
    /// Storage class applied to uploaded objects
    pub storage_class: String,
    /// Alternative endpoint, mainly for emulators
    pub endpoint: Option<String>,
}

/// Google Cloud Storage backend.
#[derive(Debug, Clone)]
pub struct GcsStore {
    op: Operator,
    bucket: String,
}

impl GcsStore {
    /// Connect to the configured bucket.
    ///
    /// This validates configuration shape only; authentication problems show
    /// up on the first listing or write.
    pub fn new(config: &GcsConfig) -> Result<Self> {
        let credential_path = config.credential_path.to_string_lossy().into_owned();
        let mut builder = Gcs::default()
            .bucket(&config.bucket)
            .credential_path(&credential_path)
            .default_storage_class(&config.storage_class)
            .disable_vm_metadata();
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint(endpoint);
        }

        let op = Operator::new(builder)
            .map_err(|e| Error::config(format!("invalid GCS configuration: {e}")))?
            .finish();

        info!(
            "configured bucket '{}' (project '{}', storage class {})",
            config.bucket, config.project_id, config.storage_class
        );
        Ok(Self {
            op,
            bucket: config.bucket.clone(),
        })
    }

    fn content_hash(meta: &Metadata) -> Option<String> {
        meta.content_md5()
            .or_else(|| meta.etag())
            .map(|hash| hash.trim_matches('"').to_string())
    }
}

#[async_trait]
impl RemoteStore for GcsStore {
    fn name(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<RemoteObjectRecord>> {
        let path = prefix.map_or_else(String::new, |p| format!("{}/", p.trim_end_matches('/')));

        let mut lister = self
            .op
            .lister_with(&path)
            .recursive(true)
            .await
            .map_err(|e| Error::remote(format!("listing '{path}' failed: {e}")))?;

        let mut records = Vec::new();
        while let Some(entry) = lister
            .try_next()
            .await
            .map_err(|e| Error::remote(format!("listing '{path}' failed: {e}")))?
        {
            if entry.metadata().is_dir() {
                continue;
            }
            // Listings usually carry the hash; fall back to a stat when the
            // service omitted it.
            let hash = match Self::content_hash(entry.metadata()) {
                Some(hash) => hash,
                None => {
                    let meta = self
                        .op
                        .stat(entry.path())
                        .await
                        .map_err(|e| Error::remote(format!("stat '{}' failed: {e}", entry.path())))?;
                    Self::content_hash(&meta).ok_or_else(|| {
                        Error::remote(format!("no content hash for '{}'", entry.path()))
                    })?
                }
            };
            records.push(RemoteObjectRecord {
                key: entry.path().to_string(),
                content_hash: hash,
            });
        }

        debug!("listed {} objects under '{}'", records.len(), path);
        Ok(records)
    }

    async fn metadata(&self, key: &str) -> Result<RemoteObjectRecord> {
        let meta = self
            .op
            .stat(key)
            .await
            .map_err(|e| Error::remote(format!("stat '{key}' failed: {e}")))?;
        let content_hash = Self::content_hash(&meta)
            .ok_or_else(|| Error::remote(format!("no content hash for '{key}'")))?;
        Ok(RemoteObjectRecord {
            key: key.to_string(),
            content_hash,
        })
    }

    async fn writer(&self, key: &str, options: &WriteOptions) -> Result<Box<dyn ObjectWriter>> {
        let writer = self
            .op
            .writer_with(key)
            .chunk(UPLOAD_CHUNK_SIZE)
            .await
            .map_err(|e| Error::remote(format!("opening writer for '{key}' failed: {e}")))?;

        if options.compress {
            Ok(Box::new(GzipGcsWriter {
                key: key.to_string(),
                encoder: GzipEncoder::new(writer.into_futures_async_write()),
            }))
        } else {
            Ok(Box::new(PlainGcsWriter {
                key: key.to_string(),
                writer,
            }))
        }
    }
}

struct PlainGcsWriter {
    key: String,
    writer: opendal::Writer,
}

#[async_trait]
impl ObjectWriter for PlainGcsWriter {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.writer
            .write(chunk.to_vec())
            .await
            .map_err(|e| Error::remote(format!("writing '{}' failed: {e}", self.key)))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut writer = self.writer;
        writer
            .close()
            .await
            .map(|_| ())
            .map_err(|e| Error::remote(format!("committing '{}' failed: {e}", self.key)))
    }
}

struct GzipGcsWriter {
    key: String,
    encoder: GzipEncoder<opendal::FuturesAsyncWriter>,
}

#[async_trait]
impl ObjectWriter for GzipGcsWriter {
    async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.encoder
            .write_all(chunk)
            .await
            .map_err(|e| Error::remote(format!("writing '{}' failed: {e}", self.key)))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut encoder = self.encoder;
        // Closing the encoder writes the gzip trailer and closes the
        // underlying multipart upload.
        encoder
            .close()
            .await
            .map_err(|e| Error::remote(format!("committing '{}' failed: {e}", self.key)))
    }
}
