use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "thelden=info";

/// Install the global `fmt` subscriber. `RUST_LOG` wins over `filter`,
/// which wins over `thelden=info`. Calling this again after a subscriber is
/// installed does nothing.
pub fn init(filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter.unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
    {
        tracing::debug!("Logging initialized");
    }
}
