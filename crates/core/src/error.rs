//! Error types for the dekomposit domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

use crate::tool::ToolErrorKind;

/// The top-level error type for all dekomposit operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Routing errors ---
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable taxonomy label, used in logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider(_) => "provider_error",
            Self::Tool(e) => e.kind().as_str(),
            Self::Routing(_) => "unresolved_language",
            Self::Memory(_) => "memory_error",
            Self::Config { .. } => "config_error",
            Self::Serialization(_) | Self::Internal(_) => "internal_error",
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid note: {0}")]
    InvalidNote(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    /// Map onto the normalized failure kinds surfaced to the model.
    pub fn kind(&self) -> ToolErrorKind {
        match self {
            Self::NotFound(_) => ToolErrorKind::NotFound,
            Self::InvalidArguments(_) => ToolErrorKind::InvalidArguments,
            Self::ExecutionFailed { .. } | Self::Timeout { .. } => ToolErrorKind::ExecutionFailed,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RoutingError {
    #[error("Could not resolve {which} language for: {text}")]
    UnresolvedLanguage { which: &'static str, text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
        assert_eq!(err.kind(), "provider_error");
    }

    #[test]
    fn tool_error_kinds() {
        let timeout = ToolError::Timeout {
            tool_name: "adaptive_translation".into(),
            timeout_secs: 30,
        };
        assert_eq!(timeout.kind(), ToolErrorKind::ExecutionFailed);
        assert_eq!(
            ToolError::InvalidArguments("missing text".into()).kind(),
            ToolErrorKind::InvalidArguments
        );

        let err = Error::Tool(ToolError::NotFound("reverso".into()));
        assert_eq!(err.kind(), "not_found");
        assert!(err.to_string().contains("reverso"));
    }

    #[test]
    fn routing_error_kind() {
        let err = Error::Routing(RoutingError::UnresolvedLanguage {
            which: "target",
            text: "translate this".into(),
        });
        assert_eq!(err.kind(), "unresolved_language");
        assert!(err.to_string().contains("target"));
    }
}
