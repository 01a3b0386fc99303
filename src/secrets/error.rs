//! Error types for secret store access, authorization and rotation.

use thiserror::Error;

/// Result type for secret store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Boxed error returned by caller-supplied rotation callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by a [`SecretStore`](super::SecretStore) implementation.
///
/// `NotFound` is the one distinguished kind: the authorizer degrades it to an
/// empty snapshot and the rotator uses it to detect that no rotation is in
/// flight. Everything else is a genuine failure.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Secret, version or stage not found in the backend.
    #[error("Secret not found: {secret_id}")]
    NotFound { secret_id: String },

    /// Failed to reach the secrets backend.
    #[error("Backend connection failed: {message}")]
    ConnectionFailed { message: String },

    /// The backend rejected the request as malformed or inconsistent.
    #[error("Invalid request for secret '{secret_id}': {reason}")]
    InvalidRequest { secret_id: String, reason: String },

    /// Backend-specific error.
    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    /// Create a not found error.
    pub fn not_found(secret_id: impl Into<String>) -> Self {
        Self::NotFound { secret_id: secret_id.into() }
    }

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::ConnectionFailed { message: message.into() }
    }

    /// Create an invalid request error.
    pub fn invalid_request(secret_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest { secret_id: secret_id.into(), reason: reason.into() }
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend { message: message.into() }
    }

    /// Whether this error means the requested secret version does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Outcome of a failed authorization.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The presented value is malformed (empty).
    #[error("invalid secret value")]
    InvalidInput,

    /// The presented value was confirmed not to match any tolerated version.
    #[error("unauthorized")]
    Unauthorized,

    /// The store could not be consulted, so the value could be neither
    /// confirmed nor rejected.
    #[error("authorization failed: {0}")]
    AuthorizationFailed(#[source] StoreError),
}

impl AuthError {
    /// True for the confirmed-invalid case only.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Errors raised while driving a rotation step.
#[derive(Error, Debug)]
pub enum RotationError {
    /// Rotation is not enabled on the secret.
    #[error("rotation disabled for {secret_id}")]
    Disabled { secret_id: String },

    /// The rotation event named a step this rotator does not know.
    #[error("invalid rotation step: {step}")]
    InvalidStep { step: String },

    /// The pending secret did not pass validation in the test step.
    #[error("secret test failed: {reason}")]
    TestFailed { reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Error returned by a set/test callback, propagated unchanged.
    #[error(transparent)]
    Callback(BoxError),
}

impl RotationError {
    pub fn disabled(secret_id: impl Into<String>) -> Self {
        Self::Disabled { secret_id: secret_id.into() }
    }

    pub fn invalid_step(step: impl Into<String>) -> Self {
        Self::InvalidStep { step: step.into() }
    }

    pub fn test_failed(reason: impl Into<String>) -> Self {
        Self::TestFailed { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_constructors() {
        let err = StoreError::not_found("arn:secret");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Secret not found: arn:secret");

        let err = StoreError::connection_failed("timeout");
        assert!(!err.is_not_found());
        assert!(matches!(err, StoreError::ConnectionFailed { .. }));
    }

    #[test]
    fn test_authorization_failed_carries_cause() {
        let err = AuthError::AuthorizationFailed(StoreError::backend("infra error"));
        assert!(err.to_string().contains("authorization failed"));
        assert!(err.to_string().contains("infra error"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_callback_error_is_unchanged() {
        let cause: BoxError = "distribution update failed".into();
        let err = RotationError::Callback(cause);
        assert_eq!(err.to_string(), "distribution update failed");
    }

    #[test]
    fn test_store_error_converts_transparently() {
        let err: RotationError = StoreError::not_found("arn:secret").into();
        assert_eq!(err.to_string(), "Secret not found: arn:secret");
    }
}
