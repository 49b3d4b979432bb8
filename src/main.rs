use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use prismisd::config::{db_path, Config};
use prismisd::locking::DaemonLock;
use prismisd::pipeline::Pipeline;
use prismisd::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let _lock = match DaemonLock::acquire() {
        Ok(lock) => lock,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let config = Config::load().context("loading config.toml")?;
    info!(fetch_interval_minutes = config.daemon.fetch_interval_minutes, "prismis daemon starting");

    let store = Store::open(db_path()).context("opening store")?;
    let pipeline = Pipeline::new(store);

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            shutdown_signal.cancel();
        }
    });

    pipeline.run(shutdown).await;
    info!("prismis daemon stopped");
    Ok(())
}

#[cfg(test)]
mod error_exit_tests {
    use super::*;

    #[test]
    fn lock_held_message_matches_spec_wording() {
        let err = prismisd::error::PrismisError::LockHeld;
        assert_eq!(err.to_string(), "Daemon already running");
    }
}
