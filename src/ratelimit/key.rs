//! Composite identifier construction.

use std::fmt;

/// A key that combines the rate-limited action with the caller's source.
///
/// The limiter treats identifiers as opaque strings; this type only exists so
/// request handlers build them the same way everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// The action being limited (e.g. `login`)
    pub action: String,
    /// Who is performing it (e.g. a client address or account id)
    pub source: String,
    encoded: String,
}

impl RateLimitKey {
    /// Create a new key for `action` performed by `source`.
    pub fn new(action: impl Into<String>, source: impl Into<String>) -> Self {
        let action = action.into();
        let source = source.into();
        let encoded = format!("{}:{}", action, source);

        Self {
            action,
            source,
            encoded,
        }
    }

    /// The identifier passed to the limiter.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl AsRef<str> for RateLimitKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}
