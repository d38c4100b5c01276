use std::{net::SocketAddr, path::PathBuf, time::Duration};

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{error, info};

use crate::{
    Node, NodeConfig, NodeError,
    logging::init_logging,
    notifier::spawn_notifier,
    scheduler::{spawn_deposit_poller, spawn_expiration_sweeper},
};

/// Serves `/metrics` on every interface at `port`.
pub fn install_metrics_exporter(port: u16) -> Result<(), NodeError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| NodeError::Error(format!("Failed to install Prometheus exporter: {e}")))?;
    info!("Metrics exporter listening on {addr}");
    Ok(())
}

pub async fn start_node(
    config: NodeConfig,
    log_file: Option<PathBuf>,
    metrics_port: Option<u16>,
) -> Result<(), NodeError> {
    init_logging(config.log_file_path.clone().or(log_file).as_deref())?;
    config.validate()?;

    if let Some(port) = metrics_port.or(config.metrics_port) {
        install_metrics_exporter(port)?;
    }

    let node = Node::open(&config)?;
    info!(
        "Custodian ledger started on {} with database {}",
        config.network,
        config.database_directory.display()
    );

    let notifier_handle = spawn_notifier(node.ledger.subscribe());
    let poller_handle = spawn_deposit_poller(
        node.ledger.clone(),
        Duration::from_secs(config.deposit_poll_interval_secs),
    );
    let sweeper_handle = spawn_expiration_sweeper(
        node.ledger.clone(),
        Duration::from_secs(config.expiration_sweep_interval_secs),
    );

    let shutdown_signal = async {
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            tokio::select! {
                result = signal::ctrl_c() => {
                    result?;
                    info!("Received SIGINT, shutting down gracefully...");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully...");
                }
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await?;
            info!("Received SIGINT, shutting down gracefully...");
        }

        Ok::<(), std::io::Error>(())
    };

    tokio::select! {
        result = shutdown_signal => {
            if let Err(e) = result {
                error!("Failed to listen for shutdown signals: {e}");
                return Err(e.into());
            }
        }
        result = poller_handle => {
            match result {
                Ok(()) => info!("Deposit poller stopped"),
                Err(e) => error!("Deposit poller error: {e}"),
            }
        }
        result = sweeper_handle => {
            match result {
                Ok(()) => info!("Expiration sweeper stopped"),
                Err(e) => error!("Expiration sweeper error: {e}"),
            }
        }
        result = notifier_handle => {
            match result {
                Ok(()) => info!("Notifier stopped"),
                Err(e) => error!("Notifier error: {e}"),
            }
        }
    }

    Ok(())
}
