use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A 0-based position in a built expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// 0-based column (character offset within the expression)
    pub column: usize,
    /// 0-based absolute byte offset from the start of the expression
    pub offset: usize,
}

/// An expression parse or evaluation error with span information (begin..end).
#[derive(Debug, Clone, PartialEq)]
pub struct ExprError {
    pub code: String,
    pub message: String,
    /// Start of the offending region
    pub begin: Position,
    /// End of the offending region (exclusive)
    pub end: Position,
}

impl ExprError {
    pub fn syntax_error(message: String, begin: Position, end: Position) -> Self {
        ExprError {
            code: "expr-syntax-error".to_string(),
            message,
            begin,
            end,
        }
    }

    pub fn reference_error(name: &str, begin: Position, end: Position) -> Self {
        ExprError {
            code: "expr-reference-error".to_string(),
            message: format!("{} is not defined", name),
            begin,
            end,
        }
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.begin == self.end {
            write!(f, "{}: {} ({})", self.begin.column, self.message, self.code)
        } else {
            write!(
                f,
                "{}-{}: {} ({})",
                self.begin.column, self.end.column, self.message, self.code
            )
        }
    }
}

impl std::error::Error for ExprError {}

/// Shared `Result` alias for the crate.
pub type Result<T> = std::result::Result<T, FormbarError>;

/// Failures of the fallible surfaces: loading documents and configuration,
/// changing fields, and talking to remote endpoints.
#[derive(Debug, Error)]
pub enum FormbarError {
    #[error("[FB-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FB-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FB-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FB-2001] invalid form document: {details}")]
    Document { details: String },

    #[error("[FB-2002] no tracked field named {name:?}")]
    UnknownField { name: String },

    #[error("[FB-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[FB-3001] request to {url} failed: {details}")]
    Transport { url: String, details: String },

    #[error("[FB-3002] request to {url} timed out after {timeout_ms} ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("[FB-3003] cannot resolve URL {url:?}: {details}")]
    InvalidUrl { url: String, details: String },

    #[error("[FB-3004] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FB-4001] {0}")]
    Expression(#[from] ExprError),
}

impl FormbarError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "FB-1001",
            Self::MissingConfig { .. } => "FB-1002",
            Self::ConfigParse { .. } => "FB-1003",
            Self::Document { .. } => "FB-2001",
            Self::UnknownField { .. } => "FB-2002",
            Self::Serialization { .. } => "FB-2101",
            Self::Transport { .. } => "FB-3001",
            Self::Timeout { .. } => "FB-3002",
            Self::InvalidUrl { .. } => "FB-3003",
            Self::Io { .. } => "FB-3004",
            Self::Expression(_) => "FB-4001",
        }
    }
}

impl From<serde_json::Error> for FormbarError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for FormbarError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<reqwest::Error> for FormbarError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport {
            url: value
                .url()
                .map(ToString::to_string)
                .unwrap_or_default(),
            details: value.to_string(),
        }
    }
}
