//! Error types for the TEO provider.

use thiserror::Error;

/// How the retry machinery should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient condition; the same call may succeed if repeated.
    Retryable,
    /// Known failure; repeating the call will not help.
    Fatal,
    /// The convergence budget ran out with the outcome unknown.
    Timeout,
}

/// Errors that can occur while managing TEO resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The cloud API rejected the request.
    #[error("API error [{code}]: {message}")]
    Api {
        /// Error code returned by the API (e.g. `InvalidParameter`).
        code: String,
        /// Human-readable message returned by the API.
        message: String,
    },

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A mutation returned no response body where one was expected.
    #[error("Malformed response from {operation}: response is empty")]
    MalformedResponse {
        /// The API operation that returned the empty response.
        operation: String,
    },

    /// The remote object reached a terminal failure status.
    #[error("{id} reached fatal status `{status}`")]
    FatalStatus {
        /// Identifier of the remote object.
        id: String,
        /// The status that was observed.
        status: String,
    },

    /// The remote object reported a status this provider does not know.
    #[error("{id} reported unrecognised status `{status}`")]
    UnexpectedStatus {
        /// Identifier of the remote object.
        id: String,
        /// The raw status string.
        status: String,
    },

    /// The convergence budget elapsed before a target status was observed.
    #[error("timeout waiting for {id} to reach {targets} (last observed: {last_status})")]
    Timeout {
        /// Identifier of the remote object.
        id: String,
        /// The statuses that would have ended the wait, joined with `|`.
        targets: String,
        /// The last status observed, or `absent`/`unknown`.
        last_status: String,
    },

    /// A batch in a batched mutation failed; earlier batches were committed.
    #[error("batch {index} of {total} failed: {source}")]
    Batch {
        /// Zero-based index of the failing batch.
        index: usize,
        /// Total number of batches.
        total: usize,
        /// The error that stopped the batch.
        #[source]
        source: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Classify the error for retry purposes.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ResourceExhausted(_) | Self::Unavailable(_) => ErrorClass::Retryable,
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::Batch { source, .. } => source.class(),
            _ => ErrorClass::Fatal,
        }
    }

    /// Whether repeating the failed call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Whether the error means "stopped waiting" rather than a known failure.
    pub fn is_timeout(&self) -> bool {
        self.class() == ErrorClass::Timeout
    }

    /// Build an error from a Tencent Cloud API error code.
    ///
    /// Throttling and internal-error codes map to retryable variants so the
    /// converge machinery can repeat the call; auth codes map to
    /// [`ProviderError::PermissionDenied`].
    pub fn from_api_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        match code.as_str() {
            "RequestLimitExceeded" | "LimitExceeded" => Self::ResourceExhausted(message),
            "InternalError" | "ResourceUnavailable" | "FailedOperation.Busy" => {
                Self::Unavailable(message)
            },
            c if c.starts_with("AuthFailure") || c == "UnauthorizedOperation" => {
                Self::PermissionDenied(message)
            },
            c if c.starts_with("ResourceNotFound") => Self::NotFound(message),
            _ => Self::Api { code, message },
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            err @ ProviderError::Timeout { .. } => {
                tonic::Status::deadline_exceeded(err.to_string())
            },
            err @ (ProviderError::FatalStatus { .. } | ProviderError::Batch { .. }) => {
                tonic::Status::aborted(err.to_string())
            },
            err => tonic::Status::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("zone-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: zone-123");

        let err = ProviderError::FatalStatus {
            id: "sid-2x1".to_string(),
            status: "fail".to_string(),
        };
        assert_eq!(format!("{}", err), "sid-2x1 reached fatal status `fail`");

        let err = ProviderError::Timeout {
            id: "sid-2x1".to_string(),
            targets: "online".to_string(),
            last_status: "progress".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "timeout waiting for sid-2x1 to reach online (last observed: progress)"
        );
    }

    #[test]
    fn test_error_class() {
        assert_eq!(
            ProviderError::ResourceExhausted("slow down".into()).class(),
            ErrorClass::Retryable
        );
        assert_eq!(ProviderError::Unavailable("down".into()).class(), ErrorClass::Retryable);
        assert_eq!(ProviderError::Validation("bad".into()).class(), ErrorClass::Fatal);
        assert_eq!(
            ProviderError::MalformedResponse {
                operation: "CreateL4Proxy".into()
            }
            .class(),
            ErrorClass::Fatal
        );
        let timeout = ProviderError::Timeout {
            id: "x".into(),
            targets: "online".into(),
            last_status: "progress".into(),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_retryable());
    }

    #[test]
    fn test_batch_error_classifies_as_source() {
        let err = ProviderError::Batch {
            index: 1,
            total: 3,
            source: Box::new(ProviderError::Timeout {
                id: "zone-1/template-1".into(),
                targets: "online".into(),
                last_status: "process".into(),
            }),
        };
        assert!(err.is_timeout());
        assert!(format!("{}", err).starts_with("batch 1 of 3 failed: timeout waiting"));
    }

    #[test]
    fn test_from_api_code() {
        assert!(ProviderError::from_api_code("RequestLimitExceeded", "qps").is_retryable());
        assert!(ProviderError::from_api_code("InternalError", "oops").is_retryable());
        assert!(matches!(
            ProviderError::from_api_code("AuthFailure.SignatureFailure", "sig"),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProviderError::from_api_code("ResourceNotFound", "gone"),
            ProviderError::NotFound(_)
        ));
        match ProviderError::from_api_code("InvalidParameter.ZoneName", "bad name") {
            ProviderError::Api { code, message } => {
                assert_eq!(code, "InvalidParameter.ZoneName");
                assert_eq!(message, "bad name");
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_to_status() {
        let status: tonic::Status = ProviderError::NotFound("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::NotFound);

        let status: tonic::Status = ProviderError::Validation("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status: tonic::Status = ProviderError::ResourceExhausted("test".to_string()).into();
        assert_eq!(status.code(), tonic::Code::ResourceExhausted);

        let status: tonic::Status = ProviderError::Timeout {
            id: "x".into(),
            targets: "online".into(),
            last_status: "progress".into(),
        }
        .into();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);

        let status: tonic::Status = ProviderError::FatalStatus {
            id: "x".into(),
            status: "fail".into(),
        }
        .into();
        assert_eq!(status.code(), tonic::Code::Aborted);

        let status: tonic::Status = ProviderError::MalformedResponse {
            operation: "CreateZone".into(),
        }
        .into();
        assert_eq!(status.code(), tonic::Code::Internal);
    }
}
