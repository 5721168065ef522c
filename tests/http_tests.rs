use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use multifetch::{Completed, PoolError, RequestPool, TransferOptions, TransportError};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,multifetch=trace"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

#[tokio::test]
async fn test_fetches_bodies_over_http() {
  setup_tracing_for_test();
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/fast"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_string("fast-body")
        .set_delay(Duration::from_millis(20)),
    )
    .expect(1)
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/slow"))
    .respond_with(
      ResponseTemplate::new(200)
        .set_body_string("slow-body")
        .set_delay(Duration::from_millis(150)),
    )
    .expect(1)
    .mount(&server)
    .await;

  let mut pool: RequestPool<&'static str> =
    RequestPool::new(Handle::current(), "http_pool").unwrap();
  pool.set_max_outstanding(2);

  let bodies = Arc::new(Mutex::new(Vec::new()));
  for route in ["slow", "fast"] {
    let bodies = bodies.clone();
    pool
      .submit(
        format!("{}/{route}", server.uri()),
        move |done: Completed<&'static str>| {
          assert_eq!(done.user_data, route);
          bodies.lock().push((route, done.body.unwrap()));
        },
        route,
      )
      .await
      .unwrap();
  }
  pool.finish_all().await.unwrap();

  let bodies = bodies.lock();
  assert_eq!(bodies.len(), 2);
  // The shorter transfer dispatched first even though it was submitted last.
  assert_eq!(bodies[0], ("fast", Bytes::from_static(b"fast-body")));
  assert_eq!(bodies[1], ("slow", Bytes::from_static(b"slow-body")));
}

#[tokio::test]
async fn test_body_switches_submission_to_post() {
  setup_tracing_for_test();
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/ingest"))
    .and(body_string("payload-bytes"))
    .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
    .expect(1)
    .mount(&server)
    .await;

  let mut pool: RequestPool<()> = RequestPool::new(Handle::current(), "post_pool").unwrap();
  let fired = Arc::new(AtomicUsize::new(0));
  let fired_in_callback = fired.clone();
  pool
    .submit_with_body(
      format!("{}/ingest", server.uri()),
      move |done: Completed<()>| {
        assert_eq!(done.body.unwrap(), Bytes::from_static(b"accepted"));
        fired_in_callback.fetch_add(1, Ordering::SeqCst);
      },
      (),
      Bytes::from_static(b"payload-bytes"),
    )
    .await
    .unwrap();
  pool.finish_all().await.unwrap();

  assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_default_options_apply_to_every_transfer() {
  setup_tracing_for_test();
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/tagged"))
    .and(header("x-pool-tag", "alpha"))
    .respond_with(ResponseTemplate::new(200).set_body_string("tagged"))
    .expect(2)
    .mount(&server)
    .await;

  let mut pool: RequestPool<u32> = RequestPool::new(Handle::current(), "tagged_pool").unwrap();
  pool
    .set_default_options(
      TransferOptions::new()
        .timeout(Duration::from_secs(5))
        .header("x-pool-tag", "alpha"),
    )
    .unwrap();

  let fired = Arc::new(AtomicUsize::new(0));
  for i in 0..2 {
    let fired = fired.clone();
    pool
      .submit(
        format!("{}/tagged", server.uri()),
        move |done: Completed<u32>| {
          assert_eq!(done.body.unwrap(), Bytes::from_static(b"tagged"));
          fired.fetch_add(1, Ordering::SeqCst);
        },
        i,
      )
      .await
      .unwrap();
  }
  pool.finish_all().await.unwrap();

  assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalid_url_is_a_setup_error() {
  setup_tracing_for_test();
  let mut pool: RequestPool<()> = RequestPool::new(Handle::current(), "bad_url_pool").unwrap();

  let result = pool
    .submit("http//missing-scheme", |_: Completed<()>| panic!("must not dispatch"), ())
    .await;

  assert!(matches!(result, Err(PoolError::Setup { .. })));
  assert_eq!(pool.outstanding_count(), 0);
  pool.finish_all().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_server_reaches_callback_as_error() {
  setup_tracing_for_test();
  // Grab a live port, then close it so the connection is refused.
  let server = MockServer::start().await;
  let dead_uri = server.uri();
  drop(server);

  let mut pool: RequestPool<()> = RequestPool::new(Handle::current(), "dead_server_pool").unwrap();
  let fired = Arc::new(AtomicUsize::new(0));
  let fired_in_callback = fired.clone();
  pool
    .submit(
      format!("{dead_uri}/gone"),
      move |done: Completed<()>| {
        assert!(matches!(done.body, Err(TransportError::Unreachable(_))));
        fired_in_callback.fetch_add(1, Ordering::SeqCst);
      },
      (),
    )
    .await
    .unwrap();
  pool.finish_all().await.unwrap();

  assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_identity_file_is_a_configuration_error() {
  setup_tracing_for_test();
  let mut pool: RequestPool<()> = RequestPool::new(Handle::current(), "identity_pool").unwrap();

  let result = pool.set_default_options(
    TransferOptions::new().identity_pem("/nonexistent/client-identity.pem"),
  );

  assert!(matches!(result, Err(PoolError::Configuration(_))));
}
