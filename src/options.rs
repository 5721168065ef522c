use std::path::PathBuf;
use std::time::Duration;

/// Transport configuration applied to every transfer a pool submits.
///
/// Replaced wholesale by [`RequestPool::set_default_options`]; transfers
/// already registered keep the settings they were built with.
///
/// [`RequestPool::set_default_options`]: crate::RequestPool::set_default_options
#[derive(Debug, Clone)]
pub struct TransferOptions {
  /// Overall deadline for a single transfer. Without one, a stalled transfer
  /// can keep the pool waiting indefinitely.
  pub timeout: Option<Duration>,
  pub connect_timeout: Option<Duration>,
  /// Disabling verification accepts any server certificate.
  pub verify_tls: bool,
  /// Maximum number of redirects to follow; `Some(0)` disables following.
  pub max_redirects: Option<usize>,
  pub user_agent: Option<String>,
  /// Headers sent with every transfer.
  pub headers: Vec<(String, String)>,
  /// PEM bundle (certificate plus private key) presented as the client
  /// identity. Read when the options are applied; a missing or unreadable
  /// file surfaces as a configuration error there.
  pub identity_pem: Option<PathBuf>,
}

impl Default for TransferOptions {
  fn default() -> Self {
    Self {
      timeout: None,
      connect_timeout: None,
      verify_tls: true,
      max_redirects: None,
      user_agent: None,
      headers: Vec::new(),
      identity_pem: None,
    }
  }
}

impl TransferOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn connect_timeout(mut self, timeout: Duration) -> Self {
    self.connect_timeout = Some(timeout);
    self
  }

  pub fn verify_tls(mut self, verify: bool) -> Self {
    self.verify_tls = verify;
    self
  }

  pub fn max_redirects(mut self, max: usize) -> Self {
    self.max_redirects = Some(max);
    self
  }

  pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
    self.user_agent = Some(agent.into());
    self
  }

  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn identity_pem(mut self, path: impl Into<PathBuf>) -> Self {
    self.identity_pem = Some(path.into());
    self
  }
}
