//! Error types for pattern compilation and route registration

use thiserror::Error;

/// Errors raised while parsing or rewriting a route pattern.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// Route pattern does not begin with a slash
    #[error("path must begin with '/' in path '{0}'")]
    MissingLeadingSlash(String),

    /// Parameter name is empty or contains characters outside `[A-Za-z0-9_]`
    #[error("invalid parameter name in path '{0}'")]
    InvalidParamName(String),

    /// A `{` was opened but never closed
    #[error("unterminated parameter in path '{0}'")]
    UnterminatedParam(String),

    /// A `len`/`range`/`min`/`max` constraint has a missing or out-of-range argument
    #[error("invalid {func}() argument in route token '{token}'")]
    InvalidConstraint {
        func: &'static str,
        token: String,
    },

    /// A raw regex constraint failed to compile
    #[error("invalid regex in route token '{token}': {reason}")]
    InvalidRegex { token: String, reason: String },
}

/// Errors raised while inserting a compiled pattern into the tree.
#[derive(Debug, Error)]
pub enum InsertError {
    /// Insert path does not begin with a slash
    #[error("path must begin with '/' in path '{0}'")]
    MissingLeadingSlash(String),

    /// The exact pattern already has a value and the tree is not mutable
    #[error("a handler is already registered for path '{0}'")]
    AlreadyRegistered(String),

    /// The path's catch-all slot is already taken by the same catch-all
    #[error("a wildcard handler is already registered for path '{0}'")]
    WildcardAlreadyRegistered(String),

    /// A parameter segment differs from the one already in the tree at the
    /// same position
    #[error("'{segment}' in new path '{path}' conflicts with existing wild path '{existing}'")]
    WildPathConflict {
        segment: String,
        path: String,
        existing: String,
    },

    /// A different catch-all is already registered at this position
    #[error("'{segment}' in new path '{path}' conflicts with existing wildcard '{existing}'")]
    WildcardConflict {
        segment: String,
        path: String,
        existing: String,
    },

    /// Catch-all segment is not directly preceded by a slash
    #[error("no / before wildcard in path '{0}'")]
    WildcardWithoutSlash(String),

    /// Catch-all segment is followed by more path
    #[error("wildcard routes are only allowed at the end of the path in path '{0}'")]
    WildcardNotAtEnd(String),

    /// The path's parameter tokens failed to parse
    #[error(transparent)]
    Pattern(#[from] PatternError),
}
