use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer as _};

const DEFAULT_LOG_LEVEL: &str = "info,department_selection_backend=debug,\
                                 department_selection_database=debug,hyper=info,\
                                 diesel_async=info,tokio_postgres=info";

/// Logs to stdout, filtered by `RUST_LOG` or [`DEFAULT_LOG_LEVEL`].
pub fn setup_telemetry() {
    let stdout_log = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(stdout_log.with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into()),
        ))
        .init();
}
