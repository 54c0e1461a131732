use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;

/// Installs the stderr subscriber. `RUST_LOG` takes precedence over `level`.
pub fn init_telemetry(level: LogLevel) {
    let Some(default_directive) = default_directive(level) else {
        return;
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if let Err(err) = installed {
        eprintln!("[taskmcp] Failed to install log subscriber: {err}");
    }
}

fn default_directive(level: LogLevel) -> Option<&'static str> {
    match level {
        LogLevel::Debug => Some("taskmcp=debug"),
        LogLevel::Info => Some("taskmcp=info"),
        LogLevel::Warn => Some("taskmcp=warn"),
        LogLevel::None => None,
    }
}
