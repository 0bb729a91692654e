//! Tracing setup for hosts embedding the client.

use tracing_subscriber::EnvFilter;

/// Install a JSON tracing subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
        .is_ok()
}
