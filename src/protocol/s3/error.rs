//! Error types for object store operations

use std::io;
use thiserror::Error;

/// Result type alias for object store operations
pub type S3Result<T> = Result<T, S3Error>;

/// Errors that can occur while talking to the object store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum S3Error {
    /// Network or authentication failure reaching the store
    #[error("Connection error: {0}")]
    Connection(String),

    /// Caller supplied an empty bucket, an empty source set or no destination
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Local file could not be opened or read
    #[error("I/O error: {0}")]
    Io(String),

    /// Transport failure while putting an object
    #[error("Upload error: {0}")]
    Upload(String),

    /// Operation aborted by the user
    #[error("Operation cancelled")]
    Cancelled,

    /// Per-call deadline elapsed
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// S3 service error with specific error code
    #[error("S3 service error ({code}): {message}")]
    Service { code: String, message: String },

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl S3Error {
    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        S3Error::InvalidArgument(message.into())
    }

    /// Whether this error means the store can no longer be reached
    ///
    /// The navigator drops back to "disconnected" when it sees one of these.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            S3Error::Connection(_) => true,
            S3Error::Service { code, .. } => is_auth_code(code),
            _ => false,
        }
    }

    /// Whether the operation was aborted rather than failed
    pub fn is_cancelled(&self) -> bool {
        matches!(self, S3Error::Cancelled)
    }

    /// Reclassify a transport failure as an upload failure
    ///
    /// Local I/O errors and cancellations keep their own kind.
    pub fn into_upload(self) -> Self {
        match self {
            S3Error::Io(_) | S3Error::Cancelled | S3Error::InvalidArgument(_) => self,
            S3Error::Upload(_) => self,
            other => S3Error::Upload(other.to_string()),
        }
    }
}

impl From<io::Error> for S3Error {
    fn from(err: io::Error) -> Self {
        S3Error::Io(err.to_string())
    }
}

/// AWS error codes that indicate rejected credentials
pub(crate) fn is_auth_code(code: &str) -> bool {
    matches!(
        code,
        "AccessDenied"
            | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch"
            | "ExpiredToken"
            | "InvalidToken"
    )
}

/// Convert AWS SDK errors to S3Error
impl<E> From<aws_sdk_s3::error::SdkError<E>> for S3Error
where
    E: aws_sdk_s3::error::ProvideErrorMetadata + std::error::Error + 'static,
{
    fn from(error: aws_sdk_s3::error::SdkError<E>) -> Self {
        use aws_sdk_s3::error::SdkError;

        match error {
            SdkError::DispatchFailure(e) => {
                S3Error::Connection(format!("Network dispatch failure: {:?}", e))
            }
            SdkError::TimeoutError(_) => S3Error::Timeout("request deadline elapsed".to_string()),
            SdkError::ResponseError(e) => {
                S3Error::Connection(format!("Response error: {:?}", e))
            }
            SdkError::ServiceError(e) => {
                let err = e.err();
                let code = err.code().unwrap_or("Unknown").to_string();
                let message = err.message().unwrap_or_default().to_string();
                if is_auth_code(&code) {
                    S3Error::Connection(format!("{}: {}", code, message))
                } else {
                    S3Error::Service { code, message }
                }
            }
            other => S3Error::Connection(format!("{:?}", other)),
        }
    }
}
