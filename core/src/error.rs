use crate::agent::UsageTally;
use std::time::Duration;

/// Bad tool arguments. Reported back to the model as tool-result data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown tool '{name}'")]
    UnknownTool { name: String },

    #[error("tool '{tool}' is missing required argument '{field}'")]
    MissingArgument { tool: String, field: String },

    #[error("argument '{field}' of tool '{tool}' must be {expected}")]
    TypeMismatch {
        tool: String,
        field: String,
        expected: String,
    },

    #[error("arguments for tool '{tool}' are not a JSON object: {reason}")]
    MalformedArguments { tool: String, reason: String },
}

impl ValidationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } => "UnknownTool",
            Self::MissingArgument { .. } => "MissingArgument",
            Self::TypeMismatch { .. } => "TypeMismatch",
            Self::MalformedArguments { .. } => "MalformedArguments",
        }
    }
}

/// Failures while reading or querying tabular data. Recoverable: the model
/// sees them as a failed tool result and may retry with other arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataAccessError {
    #[error("file '{0}' not found")]
    FileNotFound(String),

    #[error("column '{column}' not found in '{file}'")]
    UnknownColumn { file: String, column: String },

    #[error("invalid filter expression: {0}")]
    InvalidFilter(String),

    #[error("unsupported file format for '{0}'")]
    UnsupportedFormat(String),

    #[error("sheet '{sheet}' not found in '{file}'")]
    SheetNotFound { file: String, sheet: String },

    #[error("failed to parse '{file}': {reason}")]
    ParseFailed { file: String, reason: String },
}

impl DataAccessError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileNotFound(_) => "FileNotFound",
            Self::UnknownColumn { .. } => "UnknownColumn",
            Self::InvalidFilter(_) => "InvalidFilter",
            Self::UnsupportedFormat(_) => "UnsupportedFormat",
            Self::SheetNotFound { .. } => "SheetNotFound",
            Self::ParseFailed { .. } => "ParseFailed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited by {provider}, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("request to {provider} timed out")]
    Timeout { provider: String },

    #[error("transport error talking to {provider}: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} server error (status {status}): {message}")]
    ServerError {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("authentication rejected by {provider}: {message}")]
    Authentication { provider: String, message: String },

    #[error("model '{model}' not found at {provider}")]
    ModelNotFound { provider: String, model: String },

    #[error("{provider} rejected the request (status {status}): {message}")]
    BadRequest {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl ProviderError {
    /// Transient failures are worth retrying with backoff; everything else
    /// is surfaced to the caller immediately.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::Transport { .. }
                | Self::ServerError { .. }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Errors that end a session. Everything the model can act on is turned
/// into conversation data instead.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("upstream service error: {0}")]
    Upstream(#[from] ProviderError),

    #[error("exceeded {iterations} tool-calling iterations without a final answer")]
    BoundedIterationExceeded { iterations: usize, usage: UsageTally },

    #[error("internal contract violation: tool '{tool}' passed validation but has no executor")]
    InternalContractViolation { tool: String },

    #[error("query cancelled")]
    Cancelled { usage: UsageTally },
}

impl AgentError {
    /// Usage accumulated before the session was aborted, where known.
    pub fn partial_usage(&self) -> Option<UsageTally> {
        match self {
            Self::BoundedIterationExceeded { usage, .. } | Self::Cancelled { usage } => {
                Some(*usage)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classes() {
        let timeout = ProviderError::Timeout {
            provider: "openai".into(),
        };
        let auth = ProviderError::Authentication {
            provider: "openai".into(),
            message: "bad key".into(),
        };
        let missing = ProviderError::ModelNotFound {
            provider: "openai".into(),
            model: "gpt-9".into(),
        };
        assert!(timeout.is_transient());
        assert!(!auth.is_transient());
        assert!(!missing.is_transient());
    }

    #[test]
    fn rate_limit_exposes_retry_after() {
        let err = ProviderError::RateLimited {
            provider: "openai".into(),
            retry_after: Some(Duration::from_secs(2)),
        };
        assert!(err.is_transient());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn error_kinds_name_the_variant() {
        assert_eq!(
            DataAccessError::FileNotFound("missing.xlsx".into()).kind(),
            "FileNotFound"
        );
        assert_eq!(
            ValidationError::UnknownTool {
                name: "drop_table".into()
            }
            .kind(),
            "UnknownTool"
        );
    }
}
