use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use bytes::Bytes;

use crate::error::TransportError;
use crate::options::TransferOptions;

lazy_static::lazy_static! {
  static ref NEXT_TRANSFER_ID: AtomicU64 = AtomicU64::new(0);
}

/// Opaque identity of a transfer, unique for the duration it is registered
/// with a multiplexer.
///
/// Issued from a process-wide monotonic counter at registration time; never
/// derived from addresses or transport internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(u64);

impl TransferId {
  /// Issues the next identity. Called by `Multiplexer` implementations when
  /// a transfer is registered.
  pub fn next() -> Self {
    TransferId(NEXT_TRANSFER_ID.fetch_add(1, AtomicOrdering::Relaxed))
  }
}

impl fmt::Display for TransferId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "transfer#{}", self.0)
  }
}

/// Everything a multiplexer needs to start one outbound transfer.
#[derive(Debug, Clone)]
pub struct TransferSpec {
  pub url: String,
  /// When present, the transfer becomes a body-carrying (POST-equivalent)
  /// submission.
  pub body: Option<Bytes>,
  pub options: TransferOptions,
}

/// Output of one finished transfer as reported by a multiplexer.
pub type TransferResult = Result<Bytes, TransportError>;

/// Payload handed to a completion callback: the response body (or the
/// transport failure), the original URL, the transfer's identity and the
/// caller-supplied user data.
#[derive(Debug)]
pub struct Completed<U> {
  pub id: TransferId,
  pub url: String,
  pub body: TransferResult,
  pub user_data: U,
}

/// The per-transfer completion callback. Invoked exactly once, synchronously,
/// from within the pool's drain pass.
pub type CompletionCallback<U> = Box<dyn FnOnce(Completed<U>) + Send + 'static>;

/// Bookkeeping for one in-flight transfer, keyed by its `TransferId` in the
/// pool's outstanding table.
pub(crate) struct PendingRequest<U> {
  pub(crate) url: String,
  pub(crate) callback: CompletionCallback<U>,
  pub(crate) user_data: U,
}
