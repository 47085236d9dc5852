//! Error types for cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis client error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Memcached client error
    #[cfg(feature = "memcached")]
    #[error("Memcached error: {0}")]
    Memcached(#[from] memcache::MemcacheError),

    /// Raw store error reported by a connection
    #[error("Store error: {0}")]
    Backend(String),

    /// Missing connection parameters, or the store refused the connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A store operation failed or reported failure.
    #[error("Cache operation '{operation}' failed: {reason}")]
    Operation {
        /// Name of the failed operation (`set`, `delete`, `init_tags`, ...)
        operation: &'static str,
        /// What the store reported
        reason: String,
    },

    /// A value could not be rendered to its canonical JSON form.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown cache driver name
    #[error("Cache driver not supported: {0}")]
    DriverNotSupported(String),
}

impl CacheError {
    /// Create an operation error.
    pub fn operation(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Operation {
            operation,
            reason: reason.into(),
        }
    }

    /// Attribute a failure to the named operation.
    ///
    /// Raw client errors become [`CacheError::Operation`]; connection,
    /// serialization and configuration errors keep their kind.
    pub fn during(self, operation: &'static str) -> Self {
        match self {
            #[cfg(feature = "redis")]
            Self::Redis(e) => Self::operation(operation, e.to_string()),
            #[cfg(feature = "memcached")]
            Self::Memcached(e) => Self::operation(operation, e.to_string()),
            Self::Backend(reason) => Self::operation(operation, reason),
            other => other,
        }
    }

    /// Name of the failed operation, if this is an operation error.
    pub fn failed_operation(&self) -> Option<&'static str> {
        match self {
            Self::Operation { operation, .. } => Some(*operation),
            _ => None,
        }
    }

    /// Check if this error indicates a connection problem.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this error is an operation failure.
    pub fn is_operation_error(&self) -> bool {
        matches!(self, Self::Operation { .. })
    }

    /// Check if retrying the call could succeed.
    ///
    /// The cache never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Operation { .. } | Self::Backend(_)
        )
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
