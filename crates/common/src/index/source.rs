//! Backing stores for index bytes
//!
//! `fetch` returns `Ok(None)` when the source simply has nothing to offer
//! (unconfigured bucket, missing file) and `Err` when it was reachable but failed.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use std::path::PathBuf;

/// A place index bytes can be fetched from
#[async_trait]
pub trait IndexSource: Send + Sync {
    async fn fetch(&self) -> Result<Option<Vec<u8>>>;

    /// Human-readable location, used in logs and errors
    fn describe(&self) -> String;
}

/// Index object in S3
pub struct S3IndexSource {
    client: S3Client,
    bucket: String,
    key: String,
}

impl S3IndexSource {
    /// Create with existing S3 client
    pub fn with_client(client: S3Client, bucket: String, key: String) -> Self {
        Self { client, bucket, key }
    }
}

#[async_trait]
impl IndexSource for S3IndexSource {
    async fn fetch(&self) -> Result<Option<Vec<u8>>> {
        let object = self.client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| AppError::IndexSource {
                source_name: self.describe(),
                message: format!("get_object failed: {}", e),
            })?;

        let body = object.body.collect().await.map_err(|e| AppError::IndexSource {
            source_name: self.describe(),
            message: format!("Failed to read object body: {}", e),
        })?;

        Ok(Some(body.into_bytes().to_vec()))
    }

    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// Index file on local disk
pub struct LocalFileIndexSource {
    path: PathBuf,
}

impl LocalFileIndexSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl IndexSource for LocalFileIndexSource {
    async fn fetch(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::IndexSource {
                source_name: self.describe(),
                message: e.to_string(),
            }),
        }
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// In-memory bytes, for tests and embedded fixtures
pub struct StaticIndexSource {
    name: String,
    bytes: Option<Vec<u8>>,
}

impl StaticIndexSource {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: Some(bytes.into()) }
    }

    /// A source that never has data
    pub fn empty(name: impl Into<String>) -> Self {
        Self { name: name.into(), bytes: None }
    }
}

#[async_trait]
impl IndexSource for StaticIndexSource {
    async fn fetch(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.bytes.clone())
    }

    fn describe(&self) -> String {
        format!("static:{}", self.name)
    }
}
