use thiserror::Error;

/// Result type for store operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors returned by the in-memory store.
///
/// The display text matches the error replies a Redis server sends, so the
/// server layer can forward it verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Key exists but holds a different value type.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    /// List index outside `[-len, len)`.
    #[error("ERR index out of range")]
    IndexOutOfRange,
    /// Positional write on a key that does not exist.
    #[error("ERR no such key")]
    NoSuchKey,
    /// Deadline falls outside the range the clock can represent.
    #[error("ERR invalid expire time in '{command}' command")]
    InvalidExpireTime { command: &'static str },
}
