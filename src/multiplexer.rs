use crate::error::TransportError;
use crate::options::TransferOptions;
use crate::transfer::{TransferId, TransferResult, TransferSpec};

/// A non-blocking facility able to progress many concurrent transfers at
/// once and report which have finished, without blocking the caller.
///
/// The pool consumes this as a capability: register a transfer and obtain
/// its identity, pump whatever can proceed, enumerate finished transfers,
/// take each one's output, unregister it. [`HttpMultiplexer`] is the
/// production implementation; tests drive the pool with scripted ones.
///
/// [`HttpMultiplexer`]: crate::HttpMultiplexer
pub trait Multiplexer: Send {
  /// Applies transport-wide settings from a replaced options bag. Transfers
  /// already registered are unaffected.
  fn configure(&mut self, options: &TransferOptions) -> Result<(), TransportError>;

  /// Registers a transfer and returns the identity that names it until it is
  /// unregistered.
  fn register(&mut self, spec: TransferSpec) -> Result<TransferId, TransportError>;

  /// Advances whatever can proceed without blocking. Returns `true` while
  /// another immediate pass may find more progress.
  fn pump(&mut self) -> bool;

  /// Identities of transfers that finished since the previous call, in
  /// completion order.
  fn finished(&mut self) -> Vec<TransferId>;

  /// Takes the output of a finished transfer. `None` when the identity is
  /// unknown or the output was already taken.
  fn take_output(&mut self, id: TransferId) -> Option<TransferResult>;

  /// Drops all bookkeeping for a transfer. A transfer unregistered while
  /// still in flight is abandoned.
  fn unregister(&mut self, id: TransferId);
}
