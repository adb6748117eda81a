use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber. `RUST_LOG` wins over `filter` when set.
///
/// Returns `false` if a global subscriber was already installed, which is
/// harmless (tests call this repeatedly).
pub fn init(filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok()
}
