/*!
 * Error Types
 *
 * Every failure a command can produce. The display strings are the exact
 * messages carried back to callers inside `Reply::Error`, so they follow the
 * familiar Redis wording.
 */

use thiserror::Error;

/// Errors raised by the keyspace, the type handlers and command parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Operation applied to a key holding another kind of value
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    TypeMismatch,

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR value is not a valid float")]
    NotAFloat,

    #[error("ERR increment or decrement would overflow")]
    Overflow,

    #[error("ERR resulting score is not a number (NaN)")]
    NanScore,

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    /// Raised only by commands that require the key to exist (RENAME)
    #[error("ERR no such key")]
    NoSuchKey,

    #[error("ERR empty keys are not allowed")]
    EmptyKey,

    #[error("ERR invalid expire time in '{0}' command")]
    InvalidExpire(&'static str),

    #[error("ERR invalid cursor")]
    InvalidCursor,
}

/// Result alias used across the storage and command layers
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// True for errors caused by the caller's input rather than stored state
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            StoreError::Syntax
                | StoreError::WrongArity(_)
                | StoreError::UnknownCommand(_)
                | StoreError::InvalidCursor
        )
    }
}
