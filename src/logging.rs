use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "chromasynth=info";

/// Installs a fmt subscriber filtered by `RUST_LOG` (default `chromasynth=info`).
/// Does nothing if a global subscriber is already set.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
