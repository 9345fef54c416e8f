use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    /// Map `-v` repetitions and `--debug` onto a level.
    pub fn from_verbosity(verbose: u8, debug: bool) -> Self {
        if debug {
            return LogLevel::Trace;
        }
        match verbose {
            0 => LogLevel::Warn,
            1 => LogLevel::Info,
            2 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Warn as u8);

pub fn init(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn enabled(level: LogLevel) -> bool {
    LOG_LEVEL.load(Ordering::Relaxed) >= level as u8
}

pub fn error(component: &str, message: impl AsRef<str>) {
    log(LogLevel::Error, component, message.as_ref());
}

pub fn warn(component: &str, message: impl AsRef<str>) {
    log(LogLevel::Warn, component, message.as_ref());
}

pub fn info(component: &str, message: impl AsRef<str>) {
    log(LogLevel::Info, component, message.as_ref());
}

pub fn debug(component: &str, message: impl AsRef<str>) {
    log(LogLevel::Debug, component, message.as_ref());
}

pub fn trace(component: &str, message: impl AsRef<str>) {
    log(LogLevel::Trace, component, message.as_ref());
}

fn log(level: LogLevel, component: &str, message: &str) {
    if enabled(level) {
        eprintln!("[{}] {}: {}", level.label(), component, message);
    }
}
