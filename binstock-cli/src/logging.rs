use tracing_subscriber::EnvFilter;

/// Log to stderr so stdout stays a clean JSON document.
///
/// `RUST_LOG` wins when set; otherwise `verbose` picks debug over warn.
pub fn setup_logging(verbose: bool) {
    let fallback = if verbose { "binstock=debug,binstock_kernel=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
