use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use dashmap::DashMap;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, Url};
use tokio::runtime::Handle as TokioHandle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::TransportError;
use crate::multiplexer::Multiplexer;
use crate::options::TransferOptions;
use crate::transfer::{TransferId, TransferResult, TransferSpec};

/// `Multiplexer` backed by a shared HTTP client, driving each transfer as a
/// task spawned on the supplied runtime handle.
///
/// Completions park in a shared map until `pump` moves them into the ready
/// buffer; dispatch stays entirely in the hands of the caller's drain pass.
/// Dropping the multiplexer cancels its teardown token and abandons whatever
/// is still in flight.
pub struct HttpMultiplexer {
  client: Client,
  handle: TokioHandle,
  teardown: CancellationToken,
  in_flight: HashMap<TransferId, JoinHandle<()>>,
  parked: Arc<DashMap<TransferId, TransferResult>>,
  ready: Vec<TransferId>,
  outputs: HashMap<TransferId, TransferResult>,
}

impl HttpMultiplexer {
  /// Creates a multiplexer spawning its transfers on `handle`, with default
  /// transport settings.
  pub fn new(handle: TokioHandle) -> Result<Self, TransportError> {
    let client = build_client(&TransferOptions::default())?;
    Ok(Self {
      client,
      handle,
      teardown: CancellationToken::new(),
      in_flight: HashMap::new(),
      parked: Arc::new(DashMap::new()),
      ready: Vec::new(),
      outputs: HashMap::new(),
    })
  }

  fn build_request(&self, spec: &TransferSpec) -> Result<reqwest::Request, TransportError> {
    let url = Url::parse(&spec.url).map_err(|e| TransportError::InvalidUrl {
      url: spec.url.clone(),
      reason: e.to_string(),
    })?;

    let method = if spec.body.is_some() { Method::POST } else { Method::GET };
    let mut builder = self.client.request(method, url);

    for (name, value) in &spec.options.headers {
      let header_name = HeaderName::try_from(name.as_str()).map_err(|e| TransportError::InvalidHeader {
        name: name.clone(),
        reason: e.to_string(),
      })?;
      let header_value = HeaderValue::try_from(value.as_str()).map_err(|e| TransportError::InvalidHeader {
        name: name.clone(),
        reason: e.to_string(),
      })?;
      builder = builder.header(header_name, header_value);
    }

    if let Some(timeout) = spec.options.timeout {
      builder = builder.timeout(timeout);
    }
    if let Some(body) = &spec.body {
      builder = builder.body(body.clone());
    }

    builder.build().map_err(TransportError::RequestBuild)
  }
}

impl Multiplexer for HttpMultiplexer {
  fn configure(&mut self, options: &TransferOptions) -> Result<(), TransportError> {
    self.client = build_client(options)?;
    debug!("transport client rebuilt from replaced default options");
    Ok(())
  }

  fn register(&mut self, spec: TransferSpec) -> Result<TransferId, TransportError> {
    let request = self.build_request(&spec)?;
    let id = TransferId::next();

    let client = self.client.clone();
    let parked = self.parked.clone();
    let teardown = self.teardown.clone();
    let join = self.handle.spawn(async move {
      tokio::select! {
        biased;
        _ = teardown.cancelled() => {
          trace!(%id, "transfer abandoned by multiplexer teardown");
        }
        result = client.execute(request) => {
          let outcome = match result {
            Ok(response) => match response.bytes().await {
              Ok(body) => Ok(body),
              Err(error) => Err(map_transfer_error(error)),
            },
            Err(error) => Err(map_transfer_error(error)),
          };
          parked.insert(id, outcome);
        }
      }
    });

    self.in_flight.insert(id, join);
    trace!(%id, url = %spec.url, "transfer registered");
    Ok(id)
  }

  fn pump(&mut self) -> bool {
    let mut progressed = false;
    let done: Vec<TransferId> = self.parked.iter().map(|entry| *entry.key()).collect();
    for id in done {
      if let Some((_, outcome)) = self.parked.remove(&id) {
        self.in_flight.remove(&id);
        self.outputs.insert(id, outcome);
        self.ready.push(id);
        progressed = true;
      }
    }
    progressed
  }

  fn finished(&mut self) -> Vec<TransferId> {
    std::mem::take(&mut self.ready)
  }

  fn take_output(&mut self, id: TransferId) -> Option<TransferResult> {
    self.outputs.remove(&id)
  }

  fn unregister(&mut self, id: TransferId) {
    if let Some(join) = self.in_flight.remove(&id) {
      join.abort();
      warn!(%id, "transfer unregistered while still in flight");
    }
    self.outputs.remove(&id);
    self.parked.remove(&id);
  }
}

impl Drop for HttpMultiplexer {
  fn drop(&mut self) {
    self.teardown.cancel();
    if !self.in_flight.is_empty() {
      warn!(abandoned = self.in_flight.len(), "multiplexer dropped with transfers still in flight");
    }
  }
}

fn build_client(options: &TransferOptions) -> Result<Client, TransportError> {
  let mut builder = Client::builder().use_rustls_tls();

  if let Some(timeout) = options.connect_timeout {
    builder = builder.connect_timeout(timeout);
  }
  if !options.verify_tls {
    builder = builder.danger_accept_invalid_certs(true);
  }
  if let Some(max) = options.max_redirects {
    let policy = if max == 0 { Policy::none() } else { Policy::limited(max) };
    builder = builder.redirect(policy);
  }
  if let Some(agent) = &options.user_agent {
    builder = builder.user_agent(agent.clone());
  }
  if let Some(path) = &options.identity_pem {
    let pem = fs::read(path).map_err(|source| TransportError::Identity {
      path: path.clone(),
      source,
    })?;
    let identity = reqwest::Identity::from_pem(&pem).map_err(TransportError::ClientBuild)?;
    builder = builder.identity(identity);
  }

  builder.build().map_err(TransportError::ClientBuild)
}

fn map_transfer_error(error: reqwest::Error) -> TransportError {
  if error.is_connect() {
    TransportError::Unreachable(error.to_string())
  } else if error.is_timeout() {
    TransportError::TimedOut
  } else {
    TransportError::Transfer(error)
  }
}
