/// Process-wide tracing setup.
///
/// A single subscriber is installed at startup, driven by the configured
/// log level (falling back to `RUST_LOG` if present). All logging in the
/// crate goes through `tracing`'s structured macros rather than `eprintln!`.
use tracing_subscriber::EnvFilter;

pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(translate_level(log_level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Map the config's Python-style level names onto `tracing`'s directives.
fn translate_level(level: &str) -> &'static str {
    match level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        "CRITICAL" => "error",
        _ => "info",
    }
}
