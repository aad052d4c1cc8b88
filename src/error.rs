//! Error types for the incident portal rate limiter.

use thiserror::Error;

/// Main error type for rate limiting operations.
///
/// [`RateLimiter::check`](crate::ratelimit::RateLimiter::check) itself never
/// fails; these variants cover configuration, policy lookup and enforcement.
#[derive(Error, Debug)]
pub enum RateLimitError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A named policy was requested but is not configured
    #[error("Unknown rate limit policy: {0}")]
    UnknownPolicy(String),

    /// The identifier has exhausted its quota for the current window
    #[error("Rate limit exceeded for {identifier} until {reset_time}")]
    RateLimited {
        /// The identifier that was checked
        identifier: String,
        /// When the current window ends, in milliseconds since the Unix epoch
        reset_time: i64,
    },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for RateLimitError {
    fn from(e: serde_yaml::Error) -> Self {
        RateLimitError::Config(e.to_string())
    }
}

impl From<::config::ConfigError> for RateLimitError {
    fn from(e: ::config::ConfigError) -> Self {
        RateLimitError::Config(e.to_string())
    }
}

/// Result type alias for rate limiting operations.
pub type Result<T> = std::result::Result<T, RateLimitError>;
