use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use uuid::Uuid;

/// Resolves a plugin id (and optional version) to its full UTF-8 source
/// text. The returned text must remain stable for the duration of one job.
#[async_trait]
pub trait SourceStore: Send + Sync {
    async fn fetch(&self, plugin_id: Uuid, version: Option<&str>) -> Result<String, SourceError>;
}

/// Plugin source storage on Cloudflare R2 (or any S3-compatible endpoint).
///
/// Source files live under `plugins/{id}/{version}.src`; `current` is the
/// default version pointer written by the publishing flow.
pub struct R2SourceStore {
    bucket: Box<Bucket>,
}

impl R2SourceStore {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, SourceError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| SourceError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| SourceError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }

    fn key_for(plugin_id: Uuid, version: Option<&str>) -> String {
        format!("plugins/{}/{}.src", plugin_id, version.unwrap_or("current"))
    }
}

#[async_trait]
impl SourceStore for R2SourceStore {
    async fn fetch(&self, plugin_id: Uuid, version: Option<&str>) -> Result<String, SourceError> {
        let key = Self::key_for(plugin_id, version);
        let response = self.bucket.get_object(&key).await.map_err(SourceError::S3)?;
        if response.status_code() == 404 {
            return Err(SourceError::NotFound { key });
        }
        String::from_utf8(response.to_vec()).map_err(|_| SourceError::NotUtf8 { key })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("source storage configuration error: {0}")]
    Config(String),

    #[error("source object not found: {key}")]
    NotFound { key: String },

    #[error("source object {key} is not valid UTF-8")]
    NotUtf8 { key: String },
}
