//! Signal handlers for graceful termination

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `token` on SIGTERM or SIGINT instead of exiting right away
///
/// The caller observes the token and runs its own shutdown sequence.
pub fn setup_signal_handlers(token: CancellationToken) {
	tokio::spawn(async move {
		#[cfg(unix)]
		{
			use tokio::signal;

			let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
				Ok(stream) => stream,
				Err(e) => {
					warn!("Failed to setup SIGTERM handler: {}. Process will not handle SIGTERM gracefully.", e);
					return;
				}
			};

			tokio::select! {
				_ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
				_ = signal::ctrl_c() => info!("Received SIGINT, shutting down..."),
				_ = token.cancelled() => return,
			}
		}

		#[cfg(not(unix))]
		{
			tokio::select! {
				_ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down..."),
				_ = token.cancelled() => return,
			}
		}

		token.cancel();
	});
}

// vim: ts=4
