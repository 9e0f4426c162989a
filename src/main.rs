use anyhow::Result;
use clap::Parser;
use field_sync::api::ApiClient;
use field_sync::connectivity::{spawn_probe, ConnectivityMonitor};
use field_sync::sync::{spawn_scheduler, SyncEngine};
use field_sync::{config, db};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| format!("sqlite://{}/field-sync.db", cfg.app.data_dir));

    let pool = db::init_pool(&database_url).await?;
    db::run_migrations(&pool).await?;

    let client = ApiClient::from_config(&cfg)?;
    let monitor = Arc::new(ConnectivityMonitor::new(false));
    let engine = Arc::new(SyncEngine::new(
        pool.clone(),
        Arc::new(client.clone()),
        monitor.clone(),
        cfg.submit_timeout(),
    ));

    // The probe flips the monitor online once the server is reachable; the
    // scheduler reacts to that transition with a sync pass, so records left
    // over from a previous run are flushed without a manual trigger.
    let (_trigger, scheduler) = spawn_scheduler(engine.clone(), monitor.subscribe());
    let probe = spawn_probe(monitor.clone(), client, cfg.probe_interval());

    let status = engine.status().await?;
    info!(depth = status.depth, "sync engine started");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    probe.abort();
    scheduler.abort();
    Ok(())
}
