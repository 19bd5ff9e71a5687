use hk3_launcher_core::api::{app_data_dir, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber: stderr always, plus a daily rolling file
/// when enabled. `RUST_LOG` overrides the configured level. Keep the guard
/// alive until exit so buffered file output is flushed.
pub fn init(cfg: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let mut guard = None;
    let file_layer = if cfg.file {
        let dir = cfg
            .directory
            .clone()
            .unwrap_or_else(|| app_data_dir().join("logs"));
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("hk3-launcher")
            .filename_suffix("log")
            .build(&dir)
        {
            Ok(appender) => {
                let (writer, g) = tracing_appender::non_blocking(appender);
                guard = Some(g);
                Some(fmt::layer().with_ansi(false).with_writer(writer))
            }
            Err(e) => {
                eprintln!("log file disabled: {}: {e}", dir.display());
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    guard
}
