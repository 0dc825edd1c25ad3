//! Tail recorder utility

use std::sync::Arc;

use chrono::Utc;
use tail_recorder::{
    config::AppConfig,
    database::Database,
    errors::TailRecorderError,
    gateway::PersistenceGateway,
    live::LiveStateCache,
    lookup::AdsbdbClient,
    pipeline::Pipeline,
    recorder::SessionRecorder,
    resolver::{RegistrationResolver, ResolverWorker},
    session::SessionDeduplicator,
    source,
};
use tokio::{signal, sync::watch};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), TailRecorderError> {
    #[cfg(feature = "dotenvy")]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let db = Database::connect(&config.database).await?;
    let gateway: Arc<dyn PersistenceGateway> = Arc::new(db.clone());

    // Warm start: known registrations and sessions left open by the last run
    let (resolver, queue) = RegistrationResolver::new(&config.resolver);
    let registrations = gateway.load_registrations().await?;
    info!("Loaded {} cached registrations", registrations.len());
    resolver.preload(registrations);

    let (recorder, recorder_handle) = SessionRecorder::new(gateway.clone());
    let recorder_task = tokio::spawn(recorder.run());

    let mut sessions = SessionDeduplicator::new(config.sessions.gap_threshold);
    let open = gateway.load_open_sessions().await?;
    let restored = open.len();
    let expired = sessions.restore(open, Utc::now());
    info!(
        "Restored {} open sessions, closing {} that expired while stopped",
        restored - expired.len(),
        expired.len()
    );
    for session in expired {
        recorder_handle.close(session);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let lookup = Arc::new(AdsbdbClient::new(
        &config.resolver.base_url,
        config.resolver.timeout,
    )?);
    let worker = ResolverWorker::new(resolver.clone(), queue, lookup, &config.resolver)
        .with_gateway(gateway.clone());
    let worker_task = tokio::spawn(worker.run(shutdown_rx.clone()));

    let pipeline = Pipeline::new(
        source::from_config(&config.feed)?,
        sessions,
        LiveStateCache::shared(config.live.eviction_ticks),
        resolver,
        recorder_handle,
        &config,
    );
    let pipeline_task = tokio::spawn(pipeline.run(shutdown_rx));

    signal::ctrl_c().await?;
    info!("Received shutdown signal");
    if shutdown_tx.send(true).is_err() {
        error!("No task was listening for shutdown");
    }

    if let Err(e) = pipeline_task.await {
        error!("Poll loop ended abnormally: {}", e);
    }
    if let Err(e) = worker_task.await {
        error!("Resolver ended abnormally: {}", e);
    }
    // Every recorder handle is gone now, so the writer drains and stops
    match recorder_task.await {
        Ok(0) => {}
        Ok(failed) => error!("{} session writes failed", failed),
        Err(e) => error!("Session recorder ended abnormally: {}", e),
    }

    db.pool().close().await;
    info!("Tail recorder stopped");
    Ok(())
}
