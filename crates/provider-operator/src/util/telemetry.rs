use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// Initialize tracing. Verbosity is controlled by `RUST_LOG`, falling back
/// to `CAPIOPERATOR_LOG_LEVEL` (an integer verbosity) and finally `info`.
pub async fn init() {
    let logger = tracing_subscriber::fmt::layer().compact();
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter_from_verbosity()))
        .unwrap();

    let collector = Registry::default().with(logger).with(env_filter);

    tracing::subscriber::set_global_default(collector).unwrap();
}

fn default_filter_from_verbosity() -> String {
    match std::env::var("CAPIOPERATOR_LOG_LEVEL").ok().and_then(|v| v.parse::<i64>().ok()) {
        Some(v) if v >= 4 => "trace".to_string(),
        Some(v) if v >= 2 => "debug".to_string(),
        _ => "info".to_string(),
    }
}
