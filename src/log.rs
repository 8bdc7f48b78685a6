use log::{Record, Metadata, LevelFilter, SetLoggerError};

/// Target shared with the core library
pub const TARGET: &str = "drawdesk";

#[macro_use]
pub mod macros {
    #[doc(alias = "log::error")]
    #[macro_export]
    macro_rules! log_error {
        ($($arg:tt)*) => {
            ::log::error!(target:"drawdesk", $($arg)*)
        };
    }
    #[doc(alias = "log::warn")]
    #[macro_export]
    macro_rules! log_warn {
        ($($arg:tt)*) => {
            ::log::warn!(target:"drawdesk", $($arg)*)
        };
    }
    #[doc(alias = "log::info")]
    #[macro_export]
    macro_rules! log_info {
        ($($arg:tt)*) => {
            ::log::info!(target:"drawdesk", $($arg)*)
        };
    }
}

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    #[inline]
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && metadata.target() == TARGET
    }

    fn log(&self, record: &Record) {
        // stdout belongs to the console
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }
    #[inline]
    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)
        .map(|_| log::set_max_level( if cfg!(debug_assertions) || cfg!(feature = "verbose") {LevelFilter::Trace} else {LevelFilter::Info} ))
}
