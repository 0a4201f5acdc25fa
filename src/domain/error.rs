use thiserror::Error;

/// Core domain errors
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Too many requests: {message}")]
    TooManyRequests { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// Structured error returned by a downstream service, passed through as-is
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::TooManyRequests {
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// The human-readable message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound { message }
            | Self::Validation { message }
            | Self::Unauthorized { message }
            | Self::TooManyRequests { message }
            | Self::ServiceUnavailable { message }
            | Self::Remote { message, .. }
            | Self::Conflict { message }
            | Self::Configuration { message }
            | Self::Internal { message }
            | Self::Storage { message }
            | Self::Cache { message } => message,
        }
    }

    /// Numeric status used when the error crosses a process boundary
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Validation { .. } => 400,
            Self::Unauthorized { .. } => 401,
            Self::TooManyRequests { .. } => 429,
            Self::ServiceUnavailable { .. } => 503,
            Self::Remote { status, .. } => *status,
            Self::Conflict { .. } => 409,
            Self::Configuration { .. }
            | Self::Internal { .. }
            | Self::Storage { .. }
            | Self::Cache { .. } => 500,
        }
    }
}
