use thiserror::Error;

/// Result type for matching operations
pub type MatchResult<T> = Result<T, MatchError>;

/// Errors that can occur while compiling or evaluating a query.
///
/// Compile-time failures (malformed patterns, unparseable boolean
/// expressions) are always returned as values, never panics. Runtime
/// failures inside a matcher are converted into a `MatchOutcome` carrying
/// the error rather than propagated to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("Invalid regular expression pattern: {0}")]
    InvalidPattern(String),
    #[error("Invalid boolean expression: {0}")]
    InvalidExpression(String),
    #[error("Content too large: {size} bytes exceeds limit of {limit} bytes")]
    ContentTooLarge { size: usize, limit: usize },
    #[error("Matcher runtime error: {0}")]
    MatcherRuntime(String),
    #[error("Unsupported expression node: {0}")]
    UnsupportedNode(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl MatchError {
    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn invalid_expression(msg: impl Into<String>) -> Self {
        Self::InvalidExpression(msg.into())
    }

    pub fn content_too_large(size: usize, limit: usize) -> Self {
        Self::ContentTooLarge { size, limit }
    }

    pub fn matcher_runtime(msg: impl Into<String>) -> Self {
        Self::MatcherRuntime(msg.into())
    }

    pub fn unsupported_node(msg: impl Into<String>) -> Self {
        Self::UnsupportedNode(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

impl From<config::ConfigError> for MatchError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
