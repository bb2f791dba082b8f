use std::sync::Arc;
use std::sync::atomic::Ordering;

use claim_notifier::claims::HttpClaimSource;
use claim_notifier::config::NotifierConfig;
use claim_notifier::handler::handle_invocation;
use claim_notifier::history::{HistoryStore, LibSqlHistoryStore};
use claim_notifier::pipeline::{Pipeline, RunControl};
use claim_notifier::queue::{DeliveryQueue, HttpDeliveryQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Config first: nothing touches the network until it is complete.
    let config = NotifierConfig::from_env()?;

    eprintln!("Claim notifier v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Upstream: {}", config.api_url);
    eprintln!("   Queue: {}", config.queue_destination);
    eprintln!(
        "   Policy: max {} notifications, {}h cooldown",
        config.policy.max_notifications,
        config.policy.cooldown.as_secs() / 3600
    );

    // ── History store ────────────────────────────────────────────────
    let store: Arc<dyn HistoryStore> = Arc::new(
        LibSqlHistoryStore::new_local(&config.history_db_path, &config.history_table).await?,
    );
    eprintln!(
        "   History: {} (table {})",
        config.history_db_path.display(),
        config.history_table
    );

    // ── Adapters ─────────────────────────────────────────────────────
    let source = HttpClaimSource::from_config(&config)?;
    let queue: Arc<dyn DeliveryQueue> = Arc::new(HttpDeliveryQueue::new(config.request_timeout)?);
    let pipeline = Pipeline::new(&config, store, queue);

    // ── Cancellation ─────────────────────────────────────────────────
    let control = match config.run_deadline {
        Some(budget) => RunControl::new().with_deadline(budget),
        None => RunControl::new(),
    };
    let shutdown = control.shutdown_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight claims");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    let summary = handle_invocation(&source, &pipeline, &control).await?;

    eprintln!(
        "   Done: {} dispatched, {} suppressed, {} failed, {} skipped",
        summary.dispatched(),
        summary.suppressed(),
        summary.failed(),
        summary.skipped()
    );

    Ok(())
}
