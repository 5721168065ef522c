//! An admission-controlled pool for concurrent outbound HTTP transfers,
//! multiplexed through a single non-blocking transport, with per-transfer
//! completion callbacks.

mod error;
mod http;
mod multiplexer;
mod options;
mod pool;
mod transfer;

pub use error::{PoolError, TransportError};
pub use http::HttpMultiplexer;
pub use multiplexer::Multiplexer;
pub use options::TransferOptions;
pub use pool::RequestPool;
pub use transfer::{Completed, CompletionCallback, TransferId, TransferResult, TransferSpec};
