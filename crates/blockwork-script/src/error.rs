//! Kernel-script errors and their mapping onto [`EngineError`].

use std::fmt;

use thiserror::Error;

use blockwork_core::EngineError;

/// Class of a runtime error, mirroring the names scripts see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// An unbound name was read or deleted.
    Name,
    /// An operation was applied to a value of the wrong type.
    Type,
    /// A value had the right type but an unusable value.
    Value,
    /// An index or axis out of range.
    Index,
    /// Scalar division or modulo by zero.
    ZeroDivision,
    /// A record has no field of that name.
    Attribute,
}

impl ErrorKind {
    /// The error class name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Name => "NameError",
            Self::Type => "TypeError",
            Self::Value => "ValueError",
            Self::Index => "IndexError",
            Self::ZeroDivision => "ZeroDivisionError",
            Self::Attribute => "AttributeError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure to parse or run a kernel-script fragment.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ScriptError {
    /// Syntax error.
    #[error("line {line}, col {col}: {message}")]
    Parse {
        /// Description.
        message: String,
        /// 1-based line.
        line: usize,
        /// 1-based column.
        col: usize,
    },
    /// Error raised while evaluating a statement.
    #[error("{kind}: {message} (line {line})")]
    Runtime {
        /// Error class.
        kind: ErrorKind,
        /// Description.
        message: String,
        /// Line of the failing statement; 0 until known.
        line: usize,
    },
}

impl ScriptError {
    pub(crate) fn runtime(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Runtime {
            kind,
            message: message.into(),
            line: 0,
        }
    }

    pub(crate) fn at_line(self, at: usize) -> Self {
        match self {
            Self::Runtime { kind, message, line: 0 } => Self::Runtime {
                kind,
                message,
                line: at,
            },
            other => other,
        }
    }
}

impl From<ScriptError> for EngineError {
    fn from(e: ScriptError) -> Self {
        match e {
            ScriptError::Parse { message, line, col } => EngineError::Parse { line, col, message },
            ScriptError::Runtime { kind, message, line } => EngineError::Runtime {
                kind: kind.name().to_string(),
                message: format!("{message} (line {line})"),
            },
        }
    }
}

pub(crate) fn type_error(message: impl Into<String>) -> ScriptError {
    ScriptError::runtime(ErrorKind::Type, message)
}

pub(crate) fn value_error(message: impl Into<String>) -> ScriptError {
    ScriptError::runtime(ErrorKind::Value, message)
}

pub(crate) fn index_error(message: impl Into<String>) -> ScriptError {
    ScriptError::runtime(ErrorKind::Index, message)
}
