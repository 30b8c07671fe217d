//! # Synchronous Transport
//!
//! Purpose: Issue Redis-compatible commands over RESP2 and hand back the raw
//! reply. Typed operations live one layer up in `KeyValueCacheClient`.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `KVClient` hides pooling and protocol details.
//! 2. **Borrow-Friendly API**: Accept `&[&[u8]]` to avoid unnecessary copies.
//! 3. **Seam for Tests**: `CommandExecutor` lets the cache run against any
//!    executor, including a recording double.

use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::pool::{ConnectionPool, PoolConfig};
use crate::resp::RespValue;

/// Executes one command and returns the store's reply.
///
/// Implementations must be safe to share across threads; the cache client
/// never adds locking of its own.
pub trait CommandExecutor: Send + Sync {
    /// Sends `args` (command name first) and returns the reply, including
    /// `RespValue::Error` replies, which are not transport failures.
    fn execute(&self, args: &[&[u8]]) -> ClientResult<RespValue>;
}

/// TTL state of a key, mirroring Redis semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key is missing or already expired.
    Missing,
    /// Key exists without expiration.
    NoExpiry,
    /// Key expires after the provided duration.
    ExpiresIn(Duration),
}

/// Synchronous client with connection pooling.
///
/// Each call acquires a connection, executes one command, and returns the
/// connection to the pool.
pub struct KVClient {
    pool: ConnectionPool,
}

impl KVClient {
    /// Creates a client with default configuration.
    pub fn connect(addr: impl Into<String>) -> ClientResult<Self> {
        let config = ClientConfig {
            addr: addr.into(),
            ..ClientConfig::default()
        };
        Self::with_config(config)
    }

    /// Creates a client with a custom configuration.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        let pool = ConnectionPool::new(PoolConfig {
            addr: config.addr,
            max_idle: config.max_idle,
            max_total: config.max_total,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            connect_timeout: config.connect_timeout,
        })?;
        Ok(KVClient { pool })
    }

    /// Returns `(idle, total)` pooled connection counts.
    pub fn pool_stats(&self) -> (usize, usize) {
        self.pool.stats()
    }
}

impl CommandExecutor for KVClient {
    fn execute(&self, args: &[&[u8]]) -> ClientResult<RespValue> {
        let mut conn = self.pool.acquire()?;
        conn.exec(args)
    }
}
