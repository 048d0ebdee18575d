use std::sync::Arc;

use tokio::signal;

use crate::server::AppState;

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }
}

/// Report threads interrupted by shutdown. Their checkpoints stay in place, so
/// re-posting with the same thread id resumes them at the stage that was running.
pub async fn graceful_shutdown(state: &Arc<AppState>) {
    tracing::info!("Starting graceful shutdown...");

    let in_flight = state.in_flight_threads();

    if in_flight.is_empty() {
        tracing::info!("No in-flight threads");
        return;
    }

    let durable = state.config.checkpoint.dir.is_some();
    for thread_id in &in_flight {
        tracing::warn!(thread_id = %thread_id, resumable = durable, "Thread interrupted by shutdown");
    }
    if !durable {
        tracing::warn!(
            count = in_flight.len(),
            "Checkpoints are in memory; interrupted threads cannot be resumed after restart"
        );
    }

    tracing::info!("Graceful shutdown complete");
}
