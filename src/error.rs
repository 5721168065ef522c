use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::transfer::TransferId;

/// Errors surfaced by `RequestPool` operations.
#[derive(Error, Debug)]
pub enum PoolError {
  /// Constructing or registering a transfer failed. Nothing was inserted
  /// into the outstanding table.
  #[error("failed to set up transfer to {url}: {source}")]
  Setup {
    url: String,
    #[source]
    source: TransportError,
  },

  /// Applying a new default options bag to the transport failed. The
  /// previous options remain in force.
  #[error("failed to apply transfer options: {0}")]
  Configuration(#[source] TransportError),

  /// The multiplexer reported a finished transfer the pool has no record of.
  /// Bookkeeping and multiplexer state have diverged; the pool cannot be
  /// trusted past this point.
  #[error("multiplexer reported completion for untracked {0}")]
  UntrackedCompletion(TransferId),
}

/// Errors produced by a `Multiplexer` implementation.
#[derive(Error, Debug)]
pub enum TransportError {
  #[error("invalid url {url:?}: {reason}")]
  InvalidUrl { url: String, reason: String },

  #[error("invalid header {name:?}: {reason}")]
  InvalidHeader { name: String, reason: String },

  #[error("client identity {}: {source}", .path.display())]
  Identity {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to build transport client: {0}")]
  ClientBuild(#[source] reqwest::Error),

  #[error("failed to build request: {0}")]
  RequestBuild(#[source] reqwest::Error),

  #[error("could not reach the server: {0}")]
  Unreachable(String),

  #[error("transfer deadline exceeded")]
  TimedOut,

  #[error("transfer failed: {0}")]
  Transfer(reqwest::Error),
}
