use colored::{ColoredString, Colorize};
use std::sync::OnceLock;

/// Environment variable holding the minimum level that gets printed.
pub const LOG_LEVEL_ENV: &str = "JOBPORTAL_LOG";

static MIN_LEVEL: OnceLock<Level> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            _ => None,
        }
    }

    fn label(self) -> ColoredString {
        match self {
            Level::Debug => "DEBUG".bright_blue().bold(),
            Level::Info => "INFO".bright_green().bold(),
            Level::Warn => "WARN".yellow().bold(),
            Level::Error => "ERROR".red().bold(),
        }
    }
}

/// Minimum level, read once from `JOBPORTAL_LOG` (defaults to info).
pub fn min_level() -> Level {
    *MIN_LEVEL.get_or_init(|| {
        std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|raw| Level::parse(&raw))
            .unwrap_or(Level::Info)
    })
}

pub fn enabled(level: Level) -> bool {
    level >= min_level()
}

pub fn log(level: Level, msg: ColoredString) {
    if !enabled(level) {
        return;
    }
    let now = chrono::Local::now();
    println!("[{}][{}] {}", now.format("%H:%M:%S"), level.label(), msg);
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        {
            use colored::Colorize;
            $crate::server::log::log($crate::server::log::Level::Debug, format!($($arg)*).bright_blue())
        }
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        {
            use colored::Colorize;
            $crate::server::log::log($crate::server::log::Level::Info, format!($($arg)*).bright_green())
        }
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        {
            use colored::Colorize;
            $crate::server::log::log($crate::server::log::Level::Warn, format!($($arg)*).bright_yellow())
        }
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        {
            use colored::Colorize;
            $crate::server::log::log($crate::server::log::Level::Error, format!($($arg)*).bright_red())
        }
    };
}

#[test]
fn test_level_parsing_and_order() {
    assert_eq!(Level::parse("DEBUG"), Some(Level::Debug));
    assert_eq!(Level::parse(" warning "), Some(Level::Warn));
    assert_eq!(Level::parse("verbose"), None);
    assert!(Level::Error > Level::Warn);
    assert!(Level::Info > Level::Debug);
}
