use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_types::region::Region;
use chrono::Utc;
use screen_sieve_common::config::{S3Config, StorageConfig, StorageKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::{CatalogEntry, FrameCatalog};

/// One representative frame handed to long-term storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRecord {
    pub image_bytes: Vec<u8>,
    /// Session-relative capture time in seconds.
    pub captured_at: f64,
    pub identifier: String,
}

/// Long-term storage that accepts batches of deduplicated frames.
///
/// `submit` reports success per record, in batch order. The recorder only
/// deletes local frames once every record of every batch succeeded.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn submit(&self, batch: Vec<StorageRecord>) -> Vec<Result<(), StorageError>>;

    /// Flush and release the backing store. Called once when the session stops.
    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Open the sink selected in the config for session `session`.
pub async fn open_sink(
    config: &StorageConfig,
    session: &str,
) -> Result<Arc<dyn FrameSink>, StorageError> {
    match config.kind {
        StorageKind::Directory => Ok(Arc::new(DirectorySink::open(&config.dir, session)?)),
        StorageKind::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| StorageError::Open("missing [storage.s3] section".into()))?;
            let sink = ObjectStoreSink::new(s3, session).await;
            sink.ensure_bucket().await?;
            Ok(Arc::new(sink))
        }
    }
}

/// Archive directory with a SQLite catalog.
///
/// Frames land in `{root}/{session}/{identifier}` and get a row in
/// `{root}/catalog.db`.
pub struct DirectorySink {
    session_dir: PathBuf,
    session: String,
    catalog: FrameCatalog,
}

impl DirectorySink {
    pub fn open(root: &Path, session: &str) -> Result<Self, StorageError> {
        let session_dir = root.join(session);
        std::fs::create_dir_all(&session_dir)
            .map_err(|e| StorageError::Open(format!("{}: {e}", session_dir.display())))?;
        let catalog = FrameCatalog::open(root).map_err(|e| StorageError::Catalog(e.to_string()))?;
        info!(dir = %session_dir.display(), "directory archive ready");
        Ok(Self {
            session_dir,
            session: session.to_string(),
            catalog,
        })
    }

    pub fn catalog(&self) -> &FrameCatalog {
        &self.catalog
    }

    async fn store(&self, record: StorageRecord) -> Result<(), StorageError> {
        if record.identifier.is_empty()
            || record.identifier.contains(['/', '\\'])
            || record.identifier.starts_with('.')
        {
            return Err(StorageError::Put(format!(
                "invalid identifier '{}'",
                record.identifier
            )));
        }
        let path = self.session_dir.join(&record.identifier);
        let size = record.image_bytes.len() as i64;
        tokio::fs::write(&path, &record.image_bytes)
            .await
            .map_err(|e| StorageError::Put(format!("{}: {e}", path.display())))?;

        self.catalog
            .upsert(&CatalogEntry {
                session: self.session.clone(),
                identifier: record.identifier,
                captured_at: record.captured_at,
                path: path.display().to_string(),
                size_bytes: size,
                archived_at_ms: Utc::now().timestamp_millis(),
            })
            .map_err(|e| StorageError::Catalog(e.to_string()))?;

        debug!(path = %path.display(), size, "archived frame");
        Ok(())
    }
}

#[async_trait]
impl FrameSink for DirectorySink {
    async fn submit(&self, batch: Vec<StorageRecord>) -> Vec<Result<(), StorageError>> {
        let mut results = Vec::with_capacity(batch.len());
        for record in batch {
            results.push(self.store(record).await);
        }
        results
    }

    fn name(&self) -> &str {
        "directory"
    }
}

/// S3-compatible object store (AWS S3, RustFS, MinIO).
pub struct ObjectStoreSink {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    session: String,
}

impl ObjectStoreSink {
    pub async fn new(config: &S3Config, session: &str) -> Self {
        let creds = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .credentials_provider(creds)
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            prefix: config.prefix.clone(),
            session: session.to_string(),
        }
    }

    /// Ensure the bucket exists, creating it if necessary.
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!(bucket = self.bucket, "bucket exists");
                Ok(())
            }
            Err(_) => {
                info!(bucket = self.bucket, "creating bucket");
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .map_err(|e| StorageError::Open(e.to_string()))?;
                info!(bucket = self.bucket, "bucket created");
                Ok(())
            }
        }
    }

    pub fn object_key(&self, identifier: &str) -> String {
        object_key(&self.prefix, &self.session, identifier)
    }
}

#[async_trait]
impl FrameSink for ObjectStoreSink {
    async fn submit(&self, batch: Vec<StorageRecord>) -> Vec<Result<(), StorageError>> {
        let mut results = Vec::with_capacity(batch.len());
        for record in batch {
            let key = self.object_key(&record.identifier);
            let size = record.image_bytes.len();
            let result = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .content_type("image/jpeg")
                .metadata("captured-at", format!("{:.3}", record.captured_at))
                .body(ByteStream::from(record.image_bytes))
                .send()
                .await
                .map(|_| debug!(key, size, "stored frame in object store"))
                .map_err(|e| StorageError::Put(e.to_string()));
            results.push(result);
        }
        results
    }

    fn name(&self) -> &str {
        "s3"
    }
}

/// e.g. "frames/20260218T093000Z/frame_12.345.jpg"
fn object_key(prefix: &str, session: &str, identifier: &str) -> String {
    format!("{prefix}{session}/{identifier}")
}

/// Session label used to keep archives of separate runs apart.
pub fn session_label() -> String {
    Utc::now().format("%Y%m%dT%H%M%S%3fZ").to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to open storage: {0}")]
    Open(String),
    #[error("failed to store frame: {0}")]
    Put(String),
    #[error("catalog error: {0}")]
    Catalog(String),
}
