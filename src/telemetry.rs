use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes structured logging. Emits JSON to stdout by default
/// (set LOG_FORMAT=plain for human-readable output); the level is
/// controlled with the RUST_LOG environment variable.
pub fn init_telemetry() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let plain = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("plain"))
        .unwrap_or(false);

    if plain {
        let formatting_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(formatting_layer)
            .init();
    } else {
        let formatting_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .json();
        tracing_subscriber::registry()
            .with(env_filter)
            .with(formatting_layer)
            .init();
    }
}
