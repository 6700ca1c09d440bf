//! Connection settings for the object store client

use super::error::{S3Error, S3Result};
use serde::{Deserialize, Serialize};

/// Object store connection configuration
///
/// Fixed when the client is built. Bucket and prefix are per-call arguments,
/// so one client serves the whole browsing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Custom endpoint URL (MinIO, LocalStack, ...). `None` uses AWS.
    pub endpoint: Option<String>,

    /// Signing region
    pub region: String,

    /// Access key ID (uses the default credential chain if not provided)
    pub access_key: Option<String>,

    /// Secret access key
    pub secret_key: Option<String>,

    /// Session token for temporary credentials
    pub session_token: Option<String>,

    /// Path-style addressing (required by most S3-compatible services)
    pub force_path_style: bool,

    /// Per-call operation timeout in seconds (0 disables it)
    pub timeout_seconds: u64,

    /// Total SDK attempts per request. 1 means no retry.
    pub max_attempts: u32,
}

impl StoreConfig {
    /// Create a config pointing at a custom endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> S3Result<()> {
        if self.region.trim().is_empty() {
            return Err(S3Error::InvalidConfig("Region cannot be empty".to_string()));
        }

        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(S3Error::InvalidConfig(format!(
                    "Endpoint must start with http:// or https://: {}",
                    endpoint
                )));
            }
        }

        if self.access_key.is_some() != self.secret_key.is_some() {
            return Err(S3Error::InvalidConfig(
                "Both access_key and secret_key must be provided together".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(S3Error::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Check if using custom endpoint (S3-compatible service)
    pub fn is_custom_endpoint(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Check if using explicit credentials
    pub fn has_explicit_credentials(&self) -> bool {
        self.access_key.is_some() && self.secret_key.is_some()
    }

    /// Endpoint label for logs and status lines
    pub fn endpoint_label(&self) -> &str {
        self.endpoint.as_deref().unwrap_or("aws")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
            session_token: None,
            force_path_style: true,
            timeout_seconds: 60,
            max_attempts: 1,
        }
    }
}

/// Builder for StoreConfig
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Start from defaults
    pub fn new() -> Self {
        Self {
            config: StoreConfig::default(),
        }
    }

    /// Set custom endpoint (for MinIO, LocalStack, etc.)
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    /// Set the signing region
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    /// Set credentials explicitly
    pub fn credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.config.access_key = Some(access_key.into());
        self.config.secret_key = Some(secret_key.into());
        self
    }

    /// Set session token (for temporary credentials)
    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.config.session_token = Some(token.into());
        self
    }

    /// Enable or disable path-style addressing
    pub fn force_path_style(mut self, force: bool) -> Self {
        self.config.force_path_style = force;
        self
    }

    /// Set per-call timeout
    pub fn timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.timeout_seconds = seconds;
        self
    }

    /// Set total SDK attempts per request
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Build the configuration
    pub fn build(self) -> S3Result<StoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_minio_setup() {
        let config = StoreConfig::default();
        assert_eq!(config.region, "us-east-1");
        assert!(config.force_path_style);
        assert_eq!(config.max_attempts, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = StoreConfigBuilder::new()
            .endpoint("http://localhost:9000")
            .region("eu-west-1")
            .credentials("minioadmin", "minioadmin")
            .timeout_seconds(10)
            .build()
            .unwrap();

        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.region, "eu-west-1");
        assert!(config.has_explicit_credentials());
        assert_eq!(config.timeout_seconds, 10);
    }

    #[test]
    fn test_credentials_consistency() {
        let mut config = StoreConfig::default();
        config.access_key = Some("key".to_string());
        assert!(config.validate().is_err());

        config.secret_key = Some("secret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_endpoint_and_region() {
        assert!(StoreConfig::new("localhost:9000").validate().is_err());

        let mut config = StoreConfig::default();
        config.region = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = StoreConfigBuilder::new().max_attempts(0).build();
        assert!(matches!(result, Err(S3Error::InvalidConfig(_))));
    }

    #[test]
    fn test_custom_endpoint_detection() {
        assert!(!StoreConfig::default().is_custom_endpoint());
        assert_eq!(StoreConfig::default().endpoint_label(), "aws");

        let config = StoreConfig::new("http://localhost:9000");
        assert!(config.is_custom_endpoint());
        assert_eq!(config.endpoint_label(), "http://localhost:9000");
    }
}
