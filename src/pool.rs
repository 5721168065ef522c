use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle as TokioHandle;
use tracing::{debug, error, trace, warn};

use crate::error::PoolError;
use crate::http::HttpMultiplexer;
use crate::multiplexer::Multiplexer;
use crate::options::TransferOptions;
use crate::transfer::{Completed, CompletionCallback, PendingRequest, TransferId, TransferSpec};

/// Interval between completion polls while an admission or drain wait blocks.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An admission-controlled pool of concurrent outbound transfers.
///
/// The pool owns its multiplexer and the table of in-flight transfers.
/// Callers configure it once (admission limit, default transport options),
/// then submit transfers repeatedly; each submission waits while the pool is
/// at its limit, registers the transfer, and dispatches any completions that
/// are already waiting. Callbacks fire in completion order, which depends on
/// real network latency and is not submission order.
///
/// `finish_all().await` must be called before the pool is discarded;
/// dropping it with transfers outstanding abandons them and their callbacks
/// never run.
///
/// All operations take `&mut self`: the pool is driven by a single owner and
/// carries no internal synchronization.
pub struct RequestPool<U: Send + 'static> {
  pool_name: String,
  max_outstanding: usize,
  default_options: TransferOptions,
  multiplexer: Box<dyn Multiplexer>,
  outstanding: HashMap<TransferId, PendingRequest<U>>,
}

impl<U: Send + 'static> RequestPool<U> {
  /// Creates a pool driving an [`HttpMultiplexer`] that spawns its transfers
  /// on `handle`. No admission limit is set; see
  /// [`set_max_outstanding`](Self::set_max_outstanding).
  pub fn new(handle: TokioHandle, pool_name: &str) -> Result<Self, PoolError> {
    let multiplexer = HttpMultiplexer::new(handle).map_err(PoolError::Configuration)?;
    Ok(Self::with_multiplexer(Box::new(multiplexer), pool_name))
  }

  /// Creates a pool over a caller-supplied multiplexer.
  pub fn with_multiplexer(multiplexer: Box<dyn Multiplexer>, pool_name: &str) -> Self {
    debug!(pool_name = %pool_name, "request pool created");
    Self {
      pool_name: pool_name.to_string(),
      max_outstanding: 0,
      default_options: TransferOptions::default(),
      multiplexer,
      outstanding: HashMap::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  /// Number of transfers registered and not yet dispatched.
  pub fn outstanding_count(&self) -> usize {
    self.outstanding.len()
  }

  /// Sets how many transfers may be outstanding at once before `submit`
  /// blocks and waits for one to finish. 0 disables admission blocking.
  pub fn set_max_outstanding(&mut self, max_outstanding: usize) {
    debug!(pool_name = %self.pool_name, max_outstanding, "admission limit set");
    self.max_outstanding = max_outstanding;
  }

  /// Replaces the options applied to every future transfer. Transfers
  /// already registered keep the options they were built with. On failure
  /// the previous options remain in force.
  pub fn set_default_options(&mut self, options: TransferOptions) -> Result<(), PoolError> {
    self.multiplexer.configure(&options).map_err(PoolError::Configuration)?;
    self.default_options = options;
    Ok(())
  }

  /// Starts a fetch of `url`, invoking `callback` with the response body and
  /// `user_data` once the transfer finishes.
  ///
  /// Waits while the pool is at its admission limit. A registration failure
  /// is returned as [`PoolError::Setup`] with nothing tracked.
  pub async fn submit(
    &mut self,
    url: impl Into<String>,
    callback: impl FnOnce(Completed<U>) + Send + 'static,
    user_data: U,
  ) -> Result<(), PoolError> {
    self.submit_inner(url.into(), None, Box::new(callback), user_data).await
  }

  /// Like [`submit`](Self::submit), but sends `body` as a POST-equivalent
  /// submission.
  pub async fn submit_with_body(
    &mut self,
    url: impl Into<String>,
    callback: impl FnOnce(Completed<U>) + Send + 'static,
    user_data: U,
    body: Bytes,
  ) -> Result<(), PoolError> {
    self.submit_inner(url.into(), Some(body), Box::new(callback), user_data).await
  }

  async fn submit_inner(
    &mut self,
    url: String,
    body: Option<Bytes>,
    callback: CompletionCallback<U>,
    user_data: U,
  ) -> Result<(), PoolError> {
    if self.max_outstanding > 0 {
      self.wait_until_below(self.max_outstanding).await?;
    }

    let spec = TransferSpec {
      url: url.clone(),
      body,
      options: self.default_options.clone(),
    };
    let id = self.multiplexer.register(spec).map_err(|source| {
      warn!(pool_name = %self.pool_name, %url, error = %source, "transfer registration failed");
      PoolError::Setup { url: url.clone(), source }
    })?;

    debug!(pool_name = %self.pool_name, %id, %url, "transfer submitted");
    self.outstanding.insert(id, PendingRequest { url, callback, user_data });

    // Dispatch anything already finished rather than letting completions
    // accumulate until the next blocking wait.
    self.drain_completed()
  }

  /// Waits for every outstanding transfer to finish and dispatches its
  /// callback. Must be called before the pool is discarded.
  pub async fn finish_all(&mut self) -> Result<(), PoolError> {
    debug!(
      pool_name = %self.pool_name,
      outstanding = self.outstanding.len(),
      "draining pool to empty"
    );
    self.wait_until_below(1).await
  }

  /// One non-blocking drain pass: pump the multiplexer, then dispatch every
  /// transfer it reports finished, in its reporting order.
  fn drain_completed(&mut self) -> Result<(), PoolError> {
    while self.multiplexer.pump() {}

    for id in self.multiplexer.finished() {
      let Some(pending) = self.outstanding.remove(&id) else {
        error!(pool_name = %self.pool_name, %id, "finished transfer has no outstanding entry");
        return Err(PoolError::UntrackedCompletion(id));
      };
      let Some(body) = self.multiplexer.take_output(id) else {
        error!(pool_name = %self.pool_name, %id, "finished transfer has no output");
        return Err(PoolError::UntrackedCompletion(id));
      };
      self.multiplexer.unregister(id);
      trace!(pool_name = %self.pool_name, %id, url = %pending.url, "dispatching completion");

      // The entry is already out of the table: a panicking callback must not
      // leave it tracked. Panics are the caller's to handle.
      (pending.callback)(Completed {
        id,
        url: pending.url,
        body,
        user_data: pending.user_data,
      });
    }

    Ok(())
  }

  /// Polls completions until fewer than `threshold` transfers are
  /// outstanding. There is no timeout; a stalled transfer without its own
  /// deadline blocks this indefinitely.
  async fn wait_until_below(&mut self, threshold: usize) -> Result<(), PoolError> {
    loop {
      self.drain_completed()?;
      if self.outstanding.len() < threshold {
        return Ok(());
      }
      trace!(
        pool_name = %self.pool_name,
        outstanding = self.outstanding.len(),
        threshold,
        "waiting for transfers to finish"
      );
      tokio::time::sleep(POLL_INTERVAL).await;
    }
  }
}

impl<U: Send + 'static> Drop for RequestPool<U> {
  fn drop(&mut self) {
    if !self.outstanding.is_empty() {
      warn!(
        pool_name = %self.pool_name,
        abandoned = self.outstanding.len(),
        "pool dropped with transfers outstanding; finish_all() was not awaited and their callbacks will never run"
      );
    }
  }
}
