//! Object storage uploads
//!
//! Uploads finished backup files to an S3-compatible bucket. The trait keeps
//! the pipeline independent of the AWS SDK so tests can record uploads.

use crate::config::S3Config;
use anyhow::{Context, Result};
use aws_sdk_s3 as s3;
use s3::config::{Credentials, Region};
use s3::primitives::ByteStream;
use std::path::Path;
use tracing::info;

/// Destination for finished backup files
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under `key`
    fn put_file(&self, key: &str, path: &Path) -> Result<()>;
}

/// Compose an object key from the configured prefix and the file name
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// S3-compatible storage backed by the AWS SDK
pub struct S3Store {
    client: s3::Client,
    bucket: String,
    handle: tokio::runtime::Handle,
}

impl S3Store {
    /// Build a client from validated configuration
    pub async fn connect(config: &S3Config) -> Result<Self> {
        let endpoint = config.endpoint.as_deref().context("S3 endpoint is not configured")?;
        let bucket = config.bucket.clone().context("S3 bucket is not configured")?;
        let access_key = config.access_key.as_deref().context("S3 access key is not configured")?;
        let secret_key = config.secret_key.as_deref().context("S3 secret key is not configured")?;

        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .endpoint_url(endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(Credentials::new(access_key, secret_key, None, None, "Static"))
            .load()
            .await;

        // Path-style addressing works with MinIO, Garage and friends.
        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        info!("Configured S3 uploads to bucket '{}' at {}", bucket, endpoint);

        Ok(Self {
            client: s3::Client::from_conf(s3_config),
            bucket,
            handle: tokio::runtime::Handle::current(),
        })
    }
}

impl ObjectStore for S3Store {
    fn put_file(&self, key: &str, path: &Path) -> Result<()> {
        info!("Uploading {} to S3 bucket {} with key {}", path.display(), self.bucket, key);

        self.handle.block_on(async {
            let body = ByteStream::from_path(path)
                .await
                .with_context(|| format!("Failed to open {} for upload", path.display()))?;

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .with_context(|| format!("Failed to upload {} to bucket {}", key, self.bucket))?;

            Ok(())
        })
    }
}

/// Mock implementation for testing
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// A recorded upload, with the file contents as they were at upload time
    #[derive(Clone, Debug)]
    pub struct Upload {
        pub key: String,
        pub path: std::path::PathBuf,
        pub contents: Vec<u8>,
    }

    /// Mock object store for testing
    #[derive(Clone, Default)]
    pub struct MockObjectStore {
        pub uploads: Arc<Mutex<Vec<Upload>>>,
        failing_keys: Arc<Mutex<HashSet<String>>>,
        fail_all: Arc<Mutex<bool>>,
    }

    impl MockObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure every upload to fail
        pub fn with_failing_uploads(self) -> Self {
            *self.fail_all.lock().unwrap() = true;
            self
        }

        /// Configure the upload of one key to fail
        pub fn with_failing_key(self, key: &str) -> Self {
            self.failing_keys.lock().unwrap().insert(key.to_string());
            self
        }

        pub fn get_uploads(&self) -> Vec<Upload> {
            self.uploads.lock().unwrap().clone()
        }

        pub fn keys(&self) -> Vec<String> {
            self.get_uploads().into_iter().map(|u| u.key).collect()
        }
    }

    impl ObjectStore for MockObjectStore {
        fn put_file(&self, key: &str, path: &Path) -> Result<()> {
            if *self.fail_all.lock().unwrap() || self.failing_keys.lock().unwrap().contains(key) {
                anyhow::bail!("Mock upload failure for key {}", key);
            }

            let contents = std::fs::read(path)
                .with_context(|| format!("Mock upload could not read {}", path.display()))?;
            self.uploads.lock().unwrap().push(Upload {
                key: key.to_string(),
                path: path.to_path_buf(),
                contents,
            });
            Ok(())
        }
    }
}
