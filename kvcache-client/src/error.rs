use thiserror::Error;

/// Result type for the transport layer.
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by the RESP transport.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or IO failure while connecting, reading, or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// RESP2 framing or parse error.
    #[error("protocol error")]
    Protocol,
    /// Server returned an error reply.
    #[error("server error: {}", String::from_utf8_lossy(.message))]
    Server { message: Vec<u8> },
    /// Response type did not match the expected command response.
    #[error("unexpected response")]
    UnexpectedResponse,
    /// Pool is at capacity and no idle connections are available.
    #[error("connection pool exhausted")]
    PoolExhausted,
    /// Address could not be resolved into a socket address.
    #[error("invalid address")]
    InvalidAddress,
}

/// Errors surfaced by `KeyValueCacheClient`.
///
/// Read misses are never errors; they come back as `None` or an empty
/// collection.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The store could not be reached or spoke something other than RESP2.
    #[error("store unavailable: {0}")]
    Connectivity(#[source] ClientError),
    /// Argument rejected locally, before any command was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// List index outside the current list bounds.
    #[error("list index out of range")]
    IndexOutOfRange,
    /// Key holds a different value type than the command expects.
    #[error("key holds the wrong kind of value")]
    WrongType,
    /// Store rejected the command for another reason.
    #[error("store rejected command: {0}")]
    Rejected(String),
    /// Stored bytes are not valid UTF-8.
    #[error("stored value is not valid utf-8")]
    InvalidUtf8,
}

impl CacheError {
    /// Returns true for transport failures (connect, timeout, framing).
    pub fn is_connectivity(&self) -> bool {
        matches!(self, CacheError::Connectivity(_))
    }

    fn from_server_reply(message: &[u8]) -> Self {
        let text = String::from_utf8_lossy(message);
        if text.starts_with("WRONGTYPE") {
            return CacheError::WrongType;
        }
        // LSET reports a missing list as "no such key"; for a caller both
        // mean the index is not addressable.
        if text.contains("index out of range") || text.contains("no such key") {
            return CacheError::IndexOutOfRange;
        }
        if text.contains("invalid expire time") {
            return CacheError::InvalidArgument("expiry is too large");
        }
        CacheError::Rejected(text.into_owned())
    }
}

impl From<ClientError> for CacheError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Server { message } => CacheError::from_server_reply(&message),
            other => CacheError::Connectivity(other),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds a value that cannot be used.
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}
