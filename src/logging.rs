//! Logging setup.
//!
//! Control the log level with the `RUST_LOG` environment variable; when it is
//! unset the level from the configuration is used:
//!
//! ```bash
//! RUST_LOG=debug syncwatch run --root /srv/data
//! RUST_LOG=syncwatch::dispatcher=trace syncwatch run --root /srv/data
//! ```

/// Initialize the tracing subscriber with environment filter support.
pub fn init_tracing(default_level: &str) {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
		)
		.with_writer(std::io::stderr)
		.try_init();
}
