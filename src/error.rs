//! Error model for RangeTap
//!
//! Nothing in this crate is allowed to break the host page, so these errors
//! never cross into a wrapped primitive. They are produced by configuration
//! loading, storage writes and hook installation, and are logged at the
//! facade or binding boundary.

use thiserror::Error;

// =============================================================================
// Categories
// =============================================================================

/// Coarse classification used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Storage,
    Hook,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Hook => "hook",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(s)
    }
}

// =============================================================================
// ProbeError
// =============================================================================

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid pattern for {field}: {source}")]
    Pattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("Session storage {operation} failed for '{key}': {reason}")]
    Storage {
        key: String,
        operation: String,
        reason: String,
    },

    #[error("Hook for {channel} unavailable: {reason}")]
    HookUnavailable { channel: String, reason: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ProbeError {
    pub fn category(&self) -> ErrorCategory {
        use ProbeError::*;
        match self {
            Config { .. } | Pattern { .. } | ConfigParse(_) => ErrorCategory::Config,
            Storage { .. } => ErrorCategory::Storage,
            HookUnavailable { .. } => ErrorCategory::Hook,
            Internal { .. } => ErrorCategory::Internal,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn pattern(field: impl Into<String>, source: regex::Error) -> Self {
        Self::Pattern {
            field: field.into(),
            source,
        }
    }

    pub fn storage(
        key: impl Into<String>,
        operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Storage {
            key: key.into(),
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn hook_unavailable(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::HookUnavailable {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_mapping() {
        assert_eq!(ProbeError::config("x").category(), ErrorCategory::Config);
        assert_eq!(
            ProbeError::storage("k", "write", "quota").category(),
            ErrorCategory::Storage
        );
        assert_eq!(
            ProbeError::hook_unavailable("fetch", "absent").category(),
            ErrorCategory::Hook
        );
    }

    #[test]
    fn display_carries_context() {
        let e = ProbeError::storage("rangetap.prearm", "write", "quota exceeded");
        let s = e.to_string();
        assert!(s.contains("rangetap.prearm"));
        assert!(s.contains("quota exceeded"));

        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let e: ProbeError = parse.into();
        assert_eq!(e.category(), ErrorCategory::Config);
    }
}
