use multifetch::{Completed, RequestPool};
use tokio::runtime::Handle;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Admission Limit Demo (Limit: 2) ---");

  let mut pool: RequestPool<usize> =
    RequestPool::new(Handle::current(), "limited_pool").expect("transport setup failed");
  pool.set_max_outstanding(2);

  let num_transfers = 5;
  info!(
    "Submitting {} transfers with at most 2 outstanding; later submits block until a slot frees.",
    num_transfers
  );

  for i in 0..num_transfers {
    let submitted = pool
      .submit(
        "https://example.com/",
        move |done: Completed<usize>| match done.body {
          Ok(body) => info!("Transfer {} finished: {} bytes", done.user_data, body.len()),
          Err(error) => info!("Transfer {} failed: {}", done.user_data, error),
        },
        i,
      )
      .await;
    match submitted {
      Ok(()) => info!("Transfer {} admitted ({} outstanding)", i, pool.outstanding_count()),
      Err(error) => tracing::error!("Could not submit transfer {}: {}", i, error),
    }
  }

  pool.finish_all().await.expect("pool drain failed");
  info!("--- Admission Limit Demo End ---");
}
