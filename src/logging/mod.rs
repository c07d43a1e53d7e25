use log::{debug, error, info, warn, LevelFilter};
use std::path::Path;
use std::sync::{Once, OnceLock};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

static INIT: Once = Once::new();
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Initialize the global logger with console output only
pub fn init_logger(level: &str) {
    init_logger_with_config(level, false, Path::new("logs"));
}

/// Initialize the global logger from configuration
///
/// `level` accepts any `EnvFilter` directive (e.g. `info`, `chat_gatekeeper=debug`).
/// With `enable_file_logging` set, a daily rolling file is written under `log_dir`
/// in addition to the console. Only the first call has any effect.
pub fn init_logger_with_config(level: &str, enable_file_logging: bool, log_dir: &Path) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_new(level).unwrap_or_else(|e| {
            eprintln!("Warning: invalid log level '{}': {}, using info", level, e);
            EnvFilter::new("info")
        });

        let console = fmt::layer()
            .with_target(false)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(true);

        let registry = Registry::default().with(filter).with(console);

        let result = if enable_file_logging {
            let appender = tracing_appender::rolling::daily(log_dir, "chat-gatekeeper.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);

            let file = fmt::layer().with_ansi(false).with_writer(writer);
            tracing::subscriber::set_global_default(registry.with(file))
        } else {
            tracing::subscriber::set_global_default(registry)
        };

        if let Err(e) = result {
            eprintln!("Warning: Failed to set tracing subscriber: {:?}", e);
        }

        // Bridge log crate events to tracing (after subscriber is set up)
        if let Err(e) = LogTracer::init() {
            eprintln!("Warning: Failed to initialize LogTracer: {:?}", e);
        }

        log::set_max_level(level_filter(level));
    });
}

fn level_filter(level: &str) -> LevelFilter {
    level.parse::<LevelFilter>().unwrap_or(LevelFilter::Trace)
}

/// Log an error message
pub fn log_error(message: &str) {
    error!("{}", message);
}

/// Log an info message
pub fn log_info(message: &str) {
    info!("{}", message);
}

/// Log a warning message
pub fn log_warning(message: &str) {
    warn!("{}", message);
}

/// Log a debug message
pub fn log_debug(message: &str) {
    debug!("{}", message);
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error(&format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info(&format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)*) => {
        $crate::logging::log_warning(&format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_debug(&format!($($arg)*));
    };
}
