//! # kvcache In-Memory Store
//!
//! Purpose: Provide a Redis-like in-memory store for strings, hashes, and
//! lists with TTL support. It stands in for a real Redis in tests and local
//! development, and its time source is pluggable so expiry can be driven by a
//! manual clock.
//!
//! ## Design Principles
//! 1. **Sharded Locks**: Per-shard locks reduce contention under concurrency.
//! 2. **Lazy Expiry**: Expired entries are dropped on access; a sweeper is optional.
//! 3. **Clock Injection**: All deadlines come from a `Clock`, never `Instant::now()` directly.
//! 4. **Redis Semantics**: Index normalization, LREM counts, and empty-container
//!    removal follow Redis behavior.

mod clock;
mod error;
mod memory;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{EngineError, EngineResult};
pub use memory::{ExpirationHandle, MemoryStore, TtlStatus};
