//! Lazily loaded, process-lifetime index provider
//!
//! The first successful load is cached for the life of the provider. There is
//! no refresh: a new index is picked up by restarting the process. Failed or
//! empty loads are not cached, so the next caller tries the sources again.
//! Concurrent first loads are serialized by the `OnceCell`.

use super::model::Index;
use super::source::{IndexSource, LocalFileIndexSource, S3IndexSource};
use crate::config::{AwsConfig, IndexSourceConfig};
use crate::errors::{AppError, Result};
use crate::metrics::{record_index_load, IndexLoadOutcome};
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Owns the sources for one index variant and the cached snapshot
pub struct IndexProvider {
    name: String,
    sources: Vec<Box<dyn IndexSource>>,
    cell: OnceCell<Arc<Index>>,
}

impl IndexProvider {
    /// Sources are tried in order until one yields a parseable index
    pub fn new(name: impl Into<String>, sources: Vec<Box<dyn IndexSource>>) -> Self {
        Self {
            name: name.into(),
            sources,
            cell: OnceCell::new(),
        }
    }

    /// A provider that already holds its snapshot
    pub fn preloaded(name: impl Into<String>, index: Index) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
            cell: OnceCell::new_with(Some(Arc::new(index))),
        }
    }

    /// S3 (when a bucket is configured) then the local file
    pub async fn from_config(
        name: impl Into<String>,
        config: &IndexSourceConfig,
        aws: &AwsConfig,
    ) -> Self {
        let mut sources: Vec<Box<dyn IndexSource>> = Vec::with_capacity(2);

        if let Some(bucket) = config.bucket.as_deref().filter(|b| !b.is_empty()) {
            let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_types::region::Region::new(aws.region.clone()))
                .load()
                .await;
            sources.push(Box::new(S3IndexSource::with_client(
                S3Client::new(&sdk_config),
                bucket.to_string(),
                config.key.clone(),
            )));
        }

        sources.push(Box::new(LocalFileIndexSource::new(&config.local_path)));

        Self::new(name, sources)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a snapshot has been cached
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Cached index, loading it on first demand. `None` means no source
    /// produced an index; callers treat that as "no augmentation".
    pub async fn load(&self) -> Option<Arc<Index>> {
        match self.cell.get_or_try_init(|| self.fetch_first()).await {
            Ok(index) => Some(Arc::clone(index)),
            Err(e) if e.is_degradable() => {
                warn!(index = %self.name, error = %e, "No index available, retrieval disabled for this request");
                None
            }
            Err(e) => {
                error!(index = %self.name, error = %e, code = e.code().label(), "Unexpected index load failure");
                None
            }
        }
    }

    async fn fetch_first(&self) -> Result<Arc<Index>> {
        for source in &self.sources {
            let location = source.describe();

            let bytes = match source.fetch().await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    debug!(index = %self.name, source = %location, "Index source has no data");
                    record_index_load(&self.name, IndexLoadOutcome::Missing);
                    continue;
                }
                Err(e) => {
                    warn!(index = %self.name, source = %location, error = %e, "Error loading index");
                    record_index_load(&self.name, IndexLoadOutcome::Failed);
                    continue;
                }
            };

            match Index::from_slice(&bytes, &location) {
                Ok(index) => {
                    info!(
                        index = %self.name,
                        source = %location,
                        chunks = index.len(),
                        embedded = index.embedded_count(),
                        dimension = ?index.dimension(),
                        "Loaded index"
                    );
                    record_index_load(&self.name, IndexLoadOutcome::Loaded);
                    crate::metrics::set_index_chunks(&self.name, index.len());
                    return Ok(Arc::new(index));
                }
                Err(e) => {
                    warn!(index = %self.name, source = %location, error = %e, "Discarding malformed index");
                    record_index_load(&self.name, IndexLoadOutcome::Malformed);
                }
            }
        }

        Err(AppError::IndexUnavailable)
    }
}
