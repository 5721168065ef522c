use multifetch::{Completed, RequestPool};
use tokio::runtime::Handle;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false) // Disable module paths for cleaner demo output
    .init();

  info!("--- Basic Usage Demo ---");

  let mut urls: Vec<String> = std::env::args().skip(1).collect();
  if urls.is_empty() {
    urls = vec![
      "https://example.com/".to_string(),
      "https://www.rust-lang.org/".to_string(),
    ];
  }

  let mut pool: RequestPool<String> =
    RequestPool::new(Handle::current(), "basic_pool").expect("transport setup failed");

  for url in urls {
    let label = url.clone();
    let submitted = pool
      .submit(
        url.clone(),
        move |done: Completed<String>| match done.body {
          Ok(body) => info!("{} ({}): {} bytes", done.url, done.id, body.len()),
          Err(error) => info!("{} failed: {}", done.url, error),
        },
        label,
      )
      .await;
    if let Err(error) = submitted {
      tracing::error!("Could not submit {}: {}", url, error);
    }
  }

  info!("All transfers submitted. Draining pool...");
  pool.finish_all().await.expect("pool drain failed");
  info!("--- Basic Usage Demo End ---");
}
