use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,tungstenite=warn,tokio_tungstenite=warn";
const FILTER_ENV: &str = "JOBTRACK_LOG_FILTER";
const FORMAT_ENV: &str = "JOBTRACK_LOG_FORMAT";

/// Log to `~/.jobtrack/logs/client.log` so the terminal stays free for the
/// transcript. Keep the guard alive until exit to flush the writer.
pub fn init_logging() -> anyhow::Result<WorkerGuard> {
    let log_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".jobtrack")
        .join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let directive = filter_directive(
        std::env::var(FILTER_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_appender = tracing_appender::rolling::never(&log_dir, "client.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    let pretty = std::env::var(FORMAT_ENV).is_ok_and(|f| f.eq_ignore_ascii_case("pretty"));

    let registry = tracing_subscriber::registry().with(filter);
    if pretty {
        registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .pretty()
                    .with_target(true),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .flatten_event(true)
                    .with_target(true),
            )
            .init();
    }

    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        log_path = %log_dir.join("client.log").display(),
        filter = %directive,
        pretty,
    );

    Ok(guard)
}

/// `JOBTRACK_LOG_FILTER` wins over `RUST_LOG`; blank values are ignored.
fn filter_directive(filter_env: Option<String>, rust_log: Option<String>) -> String {
    [filter_env, rust_log]
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_prefers_app_variable_then_rust_log() {
        assert_eq!(
            filter_directive(Some("debug".into()), Some("warn".into())),
            "debug"
        );
        assert_eq!(filter_directive(Some("  ".into()), Some("warn".into())), "warn");
        assert_eq!(filter_directive(None, None), DEFAULT_FILTER);
    }
}
