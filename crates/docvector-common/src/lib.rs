//! Common types and utilities shared across all crates

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

pub use config::*;
pub use error::{DocVectorError, Result};
pub use types::*;

/// Install a `tracing` subscriber reading `RUST_LOG`, falling back to `info`.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
