//! Local log levels and the mapping from remote level names

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    /// Parse a local level name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Remote level names understood out of the box (syslog-style severities)
static DEFAULT_LEVELS: Lazy<HashMap<String, LogLevel>> = Lazy::new(|| {
    [
        ("DEBUG", LogLevel::Debug),
        ("INFO", LogLevel::Info),
        ("NOTICE", LogLevel::Info),
        ("WARNING", LogLevel::Warn),
        ("WARN", LogLevel::Warn),
        ("ERROR", LogLevel::Error),
        ("CRITICAL", LogLevel::Error),
        ("ALERT", LogLevel::Error),
        ("EMERGENCY", LogLevel::Error),
    ]
    .into_iter()
    .map(|(name, level)| (name.to_string(), level))
    .collect()
});

/// Mapping from remote level names to local severities
///
/// Lookups are case-insensitive. Unknown names map to the fallback level
/// (INFO unless changed).
#[derive(Debug, Clone)]
pub struct LogLevelMap {
    levels: HashMap<String, LogLevel>,
    fallback: LogLevel,
}

impl Default for LogLevelMap {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LEVELS.clone(),
            fallback: LogLevel::Info,
        }
    }
}

impl LogLevelMap {
    /// Default syslog-style mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Default mapping with `overrides` applied on top
    pub fn with_overrides<'a, I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a LogLevel)>,
    {
        let mut map = Self::default();
        for (name, level) in overrides {
            map.insert(name, *level);
        }
        map
    }

    /// Add or replace a mapping
    pub fn insert(&mut self, remote: &str, level: LogLevel) {
        self.levels.insert(remote.to_uppercase(), level);
    }

    /// Set the level used for unknown names
    pub fn with_fallback(mut self, level: LogLevel) -> Self {
        self.fallback = level;
        self
    }

    /// Map a remote level name to a local level
    pub fn resolve(&self, remote: &str) -> LogLevel {
        self.levels
            .get(&remote.to_uppercase())
            .copied()
            .unwrap_or(self.fallback)
    }
}
