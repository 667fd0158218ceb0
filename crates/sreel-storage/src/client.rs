//! S3-compatible media storage client.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// Multipart upload part size for mirrored artifacts (8 MB; S3 requires at
/// least 5 MB for every part but the last).
const MIRROR_PART_BYTES: usize = 8 * 1024 * 1024;

/// Accumulates downloaded chunks into fixed-size upload parts.
struct PartBuffer {
    buf: Vec<u8>,
    part_size: usize,
}

impl PartBuffer {
    fn new(part_size: usize) -> Self {
        Self {
            buf: Vec::new(),
            part_size,
        }
    }

    fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    fn next_full_part(&mut self) -> Option<Vec<u8>> {
        if self.buf.len() < self.part_size {
            return None;
        }
        let rest = self.buf.split_off(self.part_size);
        Some(std::mem::replace(&mut self.buf, rest))
    }

    fn into_remainder(self) -> Vec<u8> {
        self.buf
    }
}

/// The three buckets storyline media lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaBucket {
    /// Generated scene and character images.
    Images,
    /// Rendered segment videos.
    Videos,
    /// Source videos uploaded by users.
    Originals,
}

impl MediaBucket {
    pub fn default_name(&self) -> &'static str {
        match self {
            MediaBucket::Images => "storyline-images",
            MediaBucket::Videos => "storyline-videos",
            MediaBucket::Originals => "storyline-originals",
        }
    }
}

/// Blob storage for storyline media. Every successful write yields a
/// publicly fetchable URL, which downstream providers load directly.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store bytes under `key` and return the public URL.
    async fn put_object(
        &self,
        bucket: MediaBucket,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Fetch a remote artifact and store a copy under `key`, returning the
    /// public URL of the copy.
    async fn mirror_remote(
        &self,
        bucket: MediaBucket,
        key: &str,
        source_url: &str,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Delete every object whose key starts with `prefix`. Returns the
    /// number of objects removed.
    async fn remove_prefix(&self, bucket: MediaBucket, prefix: &str) -> StorageResult<u32>;
}

/// Configuration for the S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Base URL public object URLs are built from, e.g. a CDN host.
    pub public_base_url: String,
    pub region: String,
    pub images_bucket: String,
    pub videos_bucket: String,
    pub originals_bucket: String,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("STORAGE_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("STORAGE_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("STORAGE_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("STORAGE_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("STORAGE_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("STORAGE_SECRET_ACCESS_KEY not set"))?,
            public_base_url: std::env::var("STORAGE_PUBLIC_BASE_URL")
                .map_err(|_| StorageError::config_error("STORAGE_PUBLIC_BASE_URL not set"))?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "auto".to_string()),
            images_bucket: std::env::var("STORAGE_IMAGES_BUCKET")
                .unwrap_or_else(|_| MediaBucket::Images.default_name().to_string()),
            videos_bucket: std::env::var("STORAGE_VIDEOS_BUCKET")
                .unwrap_or_else(|_| MediaBucket::Videos.default_name().to_string()),
            originals_bucket: std::env::var("STORAGE_ORIGINALS_BUCKET")
                .unwrap_or_else(|_| MediaBucket::Originals.default_name().to_string()),
        })
    }
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct S3MediaStore {
    client: Client,
    public_base_url: String,
    images_bucket: String,
    videos_bucket: String,
    originals_bucket: String,
    http: reqwest::Client,
}

impl S3MediaStore {
    pub async fn new(config: StorageConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "storyline",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            images_bucket: config.images_bucket,
            videos_bucket: config.videos_bucket,
            originals_bucket: config.originals_bucket,
            http: reqwest::Client::new(),
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = StorageConfig::from_env()?;
        Self::new(config).await
    }

    fn bucket_name(&self, bucket: MediaBucket) -> &str {
        match bucket {
            MediaBucket::Images => &self.images_bucket,
            MediaBucket::Videos => &self.videos_bucket,
            MediaBucket::Originals => &self.originals_bucket,
        }
    }

    fn public_url(&self, bucket: MediaBucket, key: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, self.bucket_name(bucket), key)
    }

    async fn upload_part(
        &self,
        bucket_name: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> StorageResult<CompletedPart> {
        let uploaded = self
            .client
            .upload_part()
            .bucket(bucket_name)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        Ok(CompletedPart::builder()
            .part_number(part_number)
            .set_e_tag(uploaded.e_tag().map(str::to_string))
            .build())
    }

    /// Forward the download stream into upload parts, one part in memory at
    /// a time.
    async fn upload_stream_parts(
        &self,
        bucket_name: &str,
        key: &str,
        upload_id: &str,
        response: reqwest::Response,
    ) -> StorageResult<Vec<CompletedPart>> {
        let mut stream = response.bytes_stream();
        let mut buffer = PartBuffer::new(MIRROR_PART_BYTES);
        let mut parts: Vec<CompletedPart> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::download_failed(e.to_string()))?;
            buffer.extend(&chunk);
            while let Some(part) = buffer.next_full_part() {
                let part_number = parts.len() as i32 + 1;
                parts.push(
                    self.upload_part(bucket_name, key, upload_id, part_number, part)
                        .await?,
                );
            }
        }

        let remainder = buffer.into_remainder();
        if !remainder.is_empty() || parts.is_empty() {
            let part_number = parts.len() as i32 + 1;
            parts.push(
                self.upload_part(bucket_name, key, upload_id, part_number, remainder)
                    .await?,
            );
        }
        Ok(parts)
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn put_object(
        &self,
        bucket: MediaBucket,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        if key.is_empty() || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        debug!("Uploading {} bytes to {}/{}", bytes.len(), self.bucket_name(bucket), key);

        self.client
            .put_object()
            .bucket(self.bucket_name(bucket))
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(self.public_url(bucket, key))
    }

    async fn mirror_remote(
        &self,
        bucket: MediaBucket,
        key: &str,
        source_url: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        debug!("Mirroring {} into {}/{}", source_url, self.bucket_name(bucket), key);

        let response = self
            .http
            .get(source_url)
            .send()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StorageError::download_failed(format!(
                "{source_url} returned {}",
                response.status()
            )));
        }

        let bucket_name = self.bucket_name(bucket).to_string();
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&bucket_name)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| StorageError::upload_failed("multipart upload id missing"))?
            .to_string();

        let parts = match self
            .upload_stream_parts(&bucket_name, key, &upload_id, response)
            .await
        {
            Ok(parts) => parts,
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&bucket_name)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        "Could not abort multipart upload for {}/{}: {}",
                        bucket_name, key, abort_err
                    );
                }
                return Err(e);
            }
        };

        self.client
            .complete_multipart_upload()
            .bucket(&bucket_name)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let url = self.public_url(bucket, key);
        info!("Mirrored {} to {}", source_url, url);
        Ok(url)
    }

    async fn remove_prefix(&self, bucket: MediaBucket, prefix: &str) -> StorageResult<u32> {
        let bucket_name = self.bucket_name(bucket).to_string();
        let mut removed = 0u32;
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&bucket_name)
                .prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let listing = request
                .send()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?;

            let identifiers: Vec<ObjectIdentifier> = listing
                .contents()
                .iter()
                .filter_map(|o| o.key())
                .filter_map(|k| ObjectIdentifier::builder().key(k).build().ok())
                .collect();

            if !identifiers.is_empty() {
                let count = identifiers.len() as u32;
                let delete = Delete::builder()
                    .set_objects(Some(identifiers))
                    .build()
                    .map_err(|e| StorageError::delete_failed(e.to_string()))?;

                self.client
                    .delete_objects()
                    .bucket(&bucket_name)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| StorageError::delete_failed(e.to_string()))?;

                removed += count;
            }

            match listing.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        if removed == 0 {
            warn!("No objects under {}/{} to remove", bucket_name, prefix);
        } else {
            info!("Removed {} objects under {}/{}", removed, bucket_name, prefix);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_default_names() {
        assert_eq!(MediaBucket::Images.default_name(), "storyline-images");
        assert_eq!(MediaBucket::Videos.default_name(), "storyline-videos");
        assert_eq!(MediaBucket::Originals.default_name(), "storyline-originals");
    }

    #[test]
    fn test_part_buffer_splits_at_part_size() {
        let mut buffer = PartBuffer::new(4);
        buffer.extend(&[1, 2, 3]);
        assert!(buffer.next_full_part().is_none());

        // a large chunk yields several full parts
        buffer.extend(&[4, 5, 6, 7, 8, 9]);
        assert_eq!(buffer.next_full_part(), Some(vec![1, 2, 3, 4]));
        assert_eq!(buffer.next_full_part(), Some(vec![5, 6, 7, 8]));
        assert!(buffer.next_full_part().is_none());
        assert_eq!(buffer.into_remainder(), vec![9]);
    }

    #[test]
    fn test_part_buffer_remainder_below_part_size() {
        let mut buffer = PartBuffer::new(8);
        buffer.extend(&[1, 2, 3]);
        assert!(buffer.next_full_part().is_none());
        assert_eq!(buffer.into_remainder(), vec![1, 2, 3]);
    }
}
