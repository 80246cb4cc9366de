//! giftscan — scans the ledger for `PresentIntent` events and fulfills
//! gift-redemption intents.
//!
//! Configuration comes from the environment (see `config.rs`); the process
//! runs scan cycles forever until killed.

mod config;
mod notify;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use giftscan_core::{EventProcessor, NotificationSender, ScannerState};
use giftscan_evm::{HttpChainClient, Scanner, Scheduler};
use giftscan_storage::sqlite::SqliteStorage;

use config::RunnerConfig;
use notify::HttpNotificationClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RunnerConfig::load_from_env().context("loading configuration")?;
    info!(
        rpc_url = config.rpc_url(),
        db_path = config.db_path(),
        "starting giftscan"
    );

    let storage = Arc::new(
        SqliteStorage::open(config.db_path())
            .await
            .context("opening sqlite storage")?,
    );

    let client = HttpChainClient::new(config.rpc_url());
    let scanner = Scanner::new(
        client,
        vec![config.event_filter()],
        config.scanner().clone(),
    );
    let state = ScannerState::new(storage.clone(), config.scanner().checkpoint_save_interval);

    let notifier = Arc::new(HttpNotificationClient::new(config.notify_url()));
    let processor = EventProcessor::new(
        storage,
        notifier,
        NotificationSender::new(config.notification_kind(), config.category_names().clone()),
    );

    Scheduler::new(scanner, state, processor).run().await;
    Ok(())
}
