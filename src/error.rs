//! All error-related types for the engine. Unlike a compiler, this
//! interpreter almost never stops on error: most [ErrorKind] values are
//! recorded into the command stream and execution continues past the
//! offending sub-expression or statement (§7 of the spec this crate
//! implements). The exceptions are [ErrorKind::StackOverflowError] and
//! [ErrorKind::MemoryError], which may additionally latch safe mode.

use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// The full error taxonomy surfaced through `ERROR` commands.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorKind {
    UndefinedVariable,
    ConstWriteError,
    TypeError,
    BoundsError,
    NullPointerError,
    ArithmeticError,
    StackOverflowError,
    MemoryError,
    PreprocessorError,
    UnknownFunction,
}

impl ErrorKind {
    /// Whether this error kind may latch safe mode once raised.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::StackOverflowError | ErrorKind::MemoryError)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::UndefinedVariable => "UndefinedVariable",
            ErrorKind::ConstWriteError => "ConstWriteError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::BoundsError => "BoundsError",
            ErrorKind::NullPointerError => "NullPointerError",
            ErrorKind::ArithmeticError => "ArithmeticError",
            ErrorKind::StackOverflowError => "StackOverflowError",
            ErrorKind::MemoryError => "MemoryError",
            ErrorKind::PreprocessorError => "PreprocessorError",
            ErrorKind::UnknownFunction => "UnknownFunction",
        };
        write!(f, "{}", label)
    }
}

/// An engine-level runtime error, carrying both the taxonomy tag and a
/// human-readable message (the pair surfaced as an `ERROR` command's
/// `errorType`/`message` fields).
#[derive(Clone, Debug, Error, Serialize)]
#[error("{kind}: {message}")]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn undefined_variable(name: &str) -> Self {
        Self::new(ErrorKind::UndefinedVariable, format!("Undefined variable '{}'", name))
    }

    pub fn const_write(name: &str) -> Self {
        Self::new(ErrorKind::ConstWriteError, format!("Cannot assign to const variable '{}'", name))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message.into())
    }

    pub fn bounds(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BoundsError, message.into())
    }

    pub fn null_pointer(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NullPointerError, message.into())
    }

    pub fn arithmetic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ArithmeticError, message.into())
    }

    pub fn stack_overflow() -> Self {
        Self::new(
            ErrorKind::StackOverflowError,
            format!("Maximum call depth of {} exceeded", crate::consts::MAX_RECURSION_DEPTH),
        )
    }

    pub fn memory(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MemoryError, message.into())
    }

    pub fn preprocessor(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PreprocessorError, message.into())
    }

    pub fn unknown_function(name: &str) -> Self {
        Self::new(ErrorKind::UnknownFunction, format!("Unknown function '{}'", name))
    }
}

/// Top-level error returned by fallible, non-recoverable engine entry points
/// (e.g. a malformed AST byte buffer handed to [crate::Engine::create]).
/// This is distinct from [EngineError]/[ErrorKind], which are *recoverable*
/// runtime errors folded into the command stream rather than returned.
#[derive(Clone, Debug, Error)]
pub enum CreateError {
    #[error("AST buffer too short to contain a header")]
    TruncatedHeader,
    #[error("AST buffer has bad magic bytes (expected \"AST1\")")]
    BadMagic,
    #[error("unsupported AST wire format version {0}")]
    UnsupportedVersion(u8),
    #[error("AST buffer ended unexpectedly while decoding a node")]
    TruncatedNode,
    #[error("AST buffer contains an unrecognized node-kind tag {0}")]
    UnknownNodeKind(u8),
    #[error("AST buffer contains an unrecognized payload-kind tag {0}")]
    UnknownPayloadKind(u8),
    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,
}
