//! Structured logging to stderr so it never interleaves with the exam prompt on stdout.
//!
//! The level is controlled by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("app=info,services=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}
