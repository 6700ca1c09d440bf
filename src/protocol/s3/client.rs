//! S3 client implementation

use super::config::StoreConfig;
use super::error::{S3Error, S3Result};
use super::operations::{cancellable, require_bucket, ObjectStore};
use super::types::{ListRequest, RawListing};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as AwsS3Client;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle to one S3-compatible endpoint
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct S3Client {
    /// AWS S3 client
    client: AwsS3Client,

    /// Client configuration
    config: StoreConfig,
}

impl S3Client {
    /// Create a new client with the given configuration
    pub async fn new(config: StoreConfig) -> S3Result<Self> {
        config.validate()?;

        let client = Self::build_aws_client(&config).await;
        info!(endpoint = config.endpoint_label(), region = %config.region, "S3 client ready");

        Ok(Self { client, config })
    }

    /// Build the AWS SDK S3 client from configuration
    async fn build_aws_client(config: &StoreConfig) -> AwsS3Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                config.session_token.clone(),
                None,
                "s3nav-explicit",
            );
            loader = loader.credentials_provider(credentials);
        }

        let aws_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&aws_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        // Required for MinIO and most S3-compatible servers
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        if config.timeout_seconds > 0 {
            let timeout_config = TimeoutConfig::builder()
                .operation_timeout(Duration::from_secs(config.timeout_seconds))
                .build();
            builder = builder.timeout_config(timeout_config);
        }

        builder = builder.retry_config(RetryConfig::standard().with_max_attempts(config.max_attempts));

        AwsS3Client::from_conf(builder.build())
    }

    /// Get a reference to the configuration
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Get a reference to the underlying AWS S3 client
    pub fn aws_client(&self) -> &AwsS3Client {
        &self.client
    }

    /// Check that the endpoint answers and accepts the credentials
    pub async fn test_connection(&self, token: &CancellationToken) -> S3Result<()> {
        self.list_buckets(token).await.map(|_| ())
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_buckets(&self, token: &CancellationToken) -> S3Result<Vec<String>> {
        let request = self.client.list_buckets();
        let response = cancellable(token, async move {
            request.send().await.map_err(|e| match S3Error::from(e) {
                // Any service rejection here means we cannot browse at all
                S3Error::Service { code, message } => {
                    S3Error::Connection(format!("{}: {}", code, message))
                }
                other => other,
            })
        })
        .await?;

        let buckets: Vec<String> = response
            .buckets()
            .iter()
            .filter_map(|b| b.name().map(|s| s.to_string()))
            .collect();
        debug!(count = buckets.len(), "listed buckets");
        Ok(buckets)
    }

    async fn list_page(
        &self,
        request: &ListRequest<'_>,
        token: &CancellationToken,
    ) -> S3Result<RawListing> {
        require_bucket(request.bucket)?;

        let mut call = self
            .client
            .list_objects_v2()
            .bucket(request.bucket)
            .prefix(request.prefix)
            .delimiter(request.delimiter);

        if let Some(cursor) = request.continuation_token {
            call = call.continuation_token(cursor);
        }

        if let Some(max) = request.page_size {
            call = call.max_keys(max as i32);
        }

        let response = cancellable(token, async move {
            call.send().await.map_err(S3Error::from)
        })
        .await?;

        let keys = response
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(|s| s.to_string()))
            .collect();

        let common_prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|cp| cp.prefix().map(|s| s.to_string()))
            .collect();

        let next_continuation_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(|s| s.to_string())
        } else {
            None
        };

        Ok(RawListing {
            common_prefixes,
            keys,
            next_continuation_token,
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        source: &Path,
        token: &CancellationToken,
    ) -> S3Result<()> {
        require_bucket(bucket)?;

        let file = tokio::fs::File::open(source).await.map_err(|e| {
            S3Error::Io(format!("failed to open {}: {}", source.display(), e))
        })?;
        let body = ByteStream::read_from()
            .file(file)
            .build()
            .await
            .map_err(|e| S3Error::Io(format!("failed to read {}: {}", source.display(), e)))?;

        let content_type = mime_guess::from_path(source).first_or_octet_stream();

        let call = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type.essence_str())
            .body(body);

        cancellable(token, async move {
            call.send()
                .await
                .map(|_| ())
                .map_err(|e| S3Error::from(e).into_upload())
        })
        .await?;

        debug!(bucket, key, "put object");
        Ok(())
    }
}
