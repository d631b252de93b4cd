use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sentinel_core::backend::HttpConnector;
use sentinel_core::{EngineConfig, ReconnectOutcome, SyncEngine};

use crate::commands::common::format_status_line;
use crate::error::CliError;

/// How `sentinel run` treats the offline flag restored from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Keep whatever mode the cache recorded
    Restore,
    /// Force offline mode for this run
    Offline,
    /// Clear a cached offline mode and reconnect
    Online,
}

impl StartMode {
    pub const fn from_flags(offline: bool, online: bool) -> Self {
        if offline {
            Self::Offline
        } else if online {
            Self::Online
        } else {
            Self::Restore
        }
    }
}

pub async fn run_engine(
    config: EngineConfig,
    mode: StartMode,
    duration_secs: Option<u64>,
    status_every_secs: u64,
) -> Result<(), CliError> {
    if status_every_secs == 0 {
        return Err(CliError::InvalidArgument(
            "--status-every must be at least 1".to_string(),
        ));
    }

    let connector = Arc::new(HttpConnector::new(config.backend.clone()));
    let engine = SyncEngine::new(config, connector);
    if mode == StartMode::Offline {
        engine.store().set_offline_mode(true);
    }

    let handle = engine.initialize().await;
    if mode == StartMode::Online && engine.store().is_offline_mode() {
        match engine.set_offline_mode(false).await {
            ReconnectOutcome::Connected(report) => {
                tracing::info!("Left offline mode: {} records loaded", report.total_records());
            }
            outcome => tracing::warn!("Could not leave offline mode: {outcome:?}"),
        }
    }
    println!("{}", format_status_line(&engine.store().snapshot(), Utc::now()));

    let mut ticker = tokio::time::interval(Duration::from_secs(status_every_secs));
    ticker.tick().await;

    let deadline = async {
        match duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let signal = loop {
        tokio::select! {
            _ = ticker.tick() => {
                println!("{}", format_status_line(&engine.store().snapshot(), Utc::now()));
            }
            () = &mut deadline => break Ok(()),
            result = tokio::signal::ctrl_c() => break result,
        }
    };

    handle.teardown().await;
    println!("{}", format_status_line(&engine.store().snapshot(), Utc::now()));
    signal?;
    Ok(())
}
