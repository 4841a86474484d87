use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Called once by the binary layer.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
