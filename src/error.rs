//! Error taxonomy shared by every client in the crate.
//!
//! All operations surface failures to the caller; nothing is retried or
//! swallowed here beyond the SDK's own policy. Each variant carries the
//! operation and the resolved key, id, or path it concerned so callers can
//! tell configuration mistakes apart from provider failures.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised by the facade and its child clients.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CloudError {
    /// Raised when required fields are missing, an enum value is
    /// unrecognised, or a lifecycle call is invalid for the handle's state.
    /// Always raised locally, before any remote call is attempted.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the invalid input or state.
        message: String,
    },
    /// Raised when the provider rejects the resolved credentials.
    #[error("authentication failed during {operation}: {message}")]
    Authentication {
        /// Operation that was being attempted.
        operation: &'static str,
        /// Message returned by the provider.
        message: String,
    },
    /// Raised when the referenced object or instance does not exist.
    #[error("{operation}: {target} not found")]
    RemoteNotFound {
        /// Operation that was being attempted.
        operation: &'static str,
        /// Resolved key or instance id that was absent.
        target: String,
    },
    /// Generic provider-side failure, including quota and permission
    /// rejections.
    #[error("{operation} failed for {target}: {message}")]
    RemoteIo {
        /// Operation that was being attempted.
        operation: &'static str,
        /// Resolved key or instance id the operation concerned.
        target: String,
        /// Message returned by the provider.
        message: String,
    },
    /// Raised when a local file cannot be read or written.
    #[error("local io failed for {path}: {message}")]
    LocalIo {
        /// Local path that could not be accessed.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
    /// Raised when remote content is not valid for the requested decoding.
    #[error("failed to decode {key}: {message}")]
    Decode {
        /// Resolved key of the object being decoded.
        key: String,
        /// Underlying decode error message.
        message: String,
    },
    /// Raised when a move copied the object but failed to delete the
    /// original, leaving it present at both keys.
    #[error(
        "move copied {source_key} to {destination_key} but deleting the original failed, \
         the object now exists at both keys: {message}"
    )]
    PartialMove {
        /// Resolved key the object was copied from and still occupies.
        source_key: String,
        /// Resolved key the object was copied to.
        destination_key: String,
        /// Underlying delete error message.
        message: String,
    },
}

impl CloudError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Provider error codes that indicate the credential chain was rejected.
const AUTH_CODES: &[&str] = &[
    "AuthFailure",
    "UnrecognizedClientException",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "ExpiredToken",
    "InvalidAccessKeyId",
];

/// Provider error codes that indicate the referenced resource is absent.
const NOT_FOUND_CODES: &[&str] = &["NoSuchKey", "NotFound", "InvalidInstanceID.NotFound"];

/// Classifies a provider service error by its error code.
pub(crate) fn classify_remote(
    operation: &'static str,
    target: impl Into<String>,
    code: Option<&str>,
    message: String,
) -> CloudError {
    match code {
        Some(code) if AUTH_CODES.contains(&code) => CloudError::Authentication { operation, message },
        Some(code) if NOT_FOUND_CODES.contains(&code) => CloudError::RemoteNotFound {
            operation,
            target: target.into(),
        },
        _ => CloudError::RemoteIo {
            operation,
            target: target.into(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_codes_classify_as_authentication() {
        let error = classify_remote(
            "upload",
            "a/b",
            Some("InvalidClientTokenId"),
            String::from("token rejected"),
        );
        assert!(matches!(error, CloudError::Authentication { operation: "upload", .. }));
    }

    #[test]
    fn absence_codes_classify_as_not_found() {
        let error = classify_remote("download", "a/b", Some("NoSuchKey"), String::new());
        let CloudError::RemoteNotFound { operation, target } = error else {
            panic!("expected RemoteNotFound");
        };
        assert_eq!(operation, "download");
        assert_eq!(target, "a/b");
    }

    #[test]
    fn unknown_codes_classify_as_remote_io() {
        let error = classify_remote(
            "create",
            "t4g.micro",
            Some("InstanceLimitExceeded"),
            String::from("quota"),
        );
        assert!(matches!(error, CloudError::RemoteIo { .. }));
    }

    #[test]
    fn missing_code_classifies_as_remote_io() {
        let error = classify_remote("start", "i-123", None, String::from("timeout"));
        assert!(matches!(error, CloudError::RemoteIo { .. }));
    }
}
