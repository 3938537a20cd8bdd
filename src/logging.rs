//! Diagnostic tracing for the CLI.
//!
//! Reads `RUST_LOG` and defaults to `warn`. Output goes to stderr in compact
//! format so stdout carries only the JSON result.
//!
//! ```bash
//! RUST_LOG=flowsmith_scheduler=info,flowsmith_pipeline=debug flowsmith run plan.json
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(std::io::stderr).compact())
    .init();
}
