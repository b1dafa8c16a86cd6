//! chorehub serve

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::scheduler::ReminderScheduler;
use crate::server;

use super::Workspace;

/// Options for `chorehub serve`
pub struct ServeOptions {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub output: OutputOptions,
}

pub fn run(options: ServeOptions) -> Result<()> {
    let mut workspace = Workspace::open(options.data_dir.as_deref())?;
    if let Some(bind) = options.bind {
        workspace.config.server.bind = bind;
    }
    if let Some(port) = options.port {
        workspace.config.server.port = port;
    }

    let config = workspace.config.clone();
    let household = Arc::new(workspace.household());
    info!(data_dir = %workspace.storage.data_dir().display(), "household loaded");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scheduler = if config.reminders.enabled {
            let scheduler = ReminderScheduler::new(Arc::clone(&household), config.reminders.clone());
            Some(tokio::spawn(scheduler.run(shutdown_rx.clone())))
        } else {
            info!("reminder scheduler disabled");
            None
        };

        let signals = tokio::spawn(async move {
            shutdown_signal().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        });

        let served = server::serve(household, &config, shutdown_rx).await;
        signals.abort();
        if let Some(handle) = scheduler {
            if let Err(err) = handle.await {
                warn!(error = %err, "reminder scheduler ended abnormally");
            }
        }
        served
    })?;

    let mut human = HumanOutput::new("chorehub stopped");
    human.push_summary("data dir", workspace.storage.data_dir().display().to_string());
    emit_success(
        options.output,
        "serve",
        &serde_json::json!({ "stopped": true }),
        Some(&human),
    )
}

/// Resolves on Ctrl+C or SIGTERM. A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
