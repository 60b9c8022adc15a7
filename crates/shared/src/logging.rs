use crate::config::LogFormat;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Respects RUST_LOG, otherwise `info` for
/// JSON output and `debug` for pretty development output.
pub fn init_logging(format: LogFormat) {
    let default_directive = match format {
        LogFormat::Json => "info",
        LogFormat::Pretty => "debug",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(fmt_layer.with_thread_ids(true).with_thread_names(true).json())
            .init(),
        LogFormat::Pretty => registry.with(fmt_layer.pretty()).init(),
    }

    tracing::info!(format = ?format, "Logging initialized");
}
