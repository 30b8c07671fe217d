//! # kvcache RESP Server
//!
//! Purpose: Expose the in-memory store over RESP2 so Redis clients, including
//! `kvcache-client`, can run against it without a real Redis.
//!
//! ## Design Principles
//! 1. **Task per Connection**: Each client is served on its own tokio task.
//! 2. **Incremental Parsing**: Requests are decoded from a reusable `BytesMut`.
//! 3. **Redis-Compatible Replies**: Error texts match Redis so clients can map them.

mod protocol;
mod server;

pub use protocol::{RespError, RespParser};
pub use server::{dispatch_command, handle_connection, serve};
