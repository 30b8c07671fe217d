//! # KV Cache Client
//!
//! Purpose: Give application code a small, typed cache API (strings with
//! expiry, hashes, lists) on top of a Redis-compatible store reached over a
//! pooled, synchronous RESP2 connection.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse TCP connections to avoid repeated connects.
//! 2. **Layered API**: `KVClient` moves raw commands; `KeyValueCacheClient`
//!    owns argument checks, reply decoding, and error classification.
//! 3. **Minimal Allocation**: Reuse buffers for RESP framing and parsing.
//! 4. **Protocol Clarity**: Encode/parse RESP2 explicitly for correctness.

mod cache;
mod client;
mod config;
mod error;
mod expiry;
mod pool;
mod resp;

pub use cache::KeyValueCacheClient;
pub use client::{CommandExecutor, KVClient, KeyTtl};
pub use config::ClientConfig;
pub use error::{CacheError, CacheResult, ClientError, ClientResult, ConfigError};
pub use expiry::{ExpiryPolicy, ExpiryUnit};
pub use resp::RespValue;
