//! Logging utilities for formatting version and change output based on verbosity.
use crate::version::Version;
use colored::{Color, Colorize};

/// Controls level of detail emitted by loggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Verbosity {
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl From<u8> for Verbosity {
    fn from(value: u8) -> Self {
        match value {
            0 => Verbosity::Off,
            1 => Verbosity::Low,
            2 => Verbosity::Medium,
            _ => Verbosity::High,
        }
    }
}

/// A no-op logger implementation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NoOpLogger {}

impl Log for NoOpLogger {
    fn log(&self, _: Verbosity, _: &str) {}
}

/// A `tracing`-based logger implementation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TracingLogger {
    verbosity: Verbosity,
}

impl TracingLogger {
    #[must_use]
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }
}

impl Log for TracingLogger {
    fn log(&self, verbosity: Verbosity, message: &str) {
        if verbosity > self.verbosity {
            return;
        }
        tracing::info!("{message}");
    }
}

/// Abstraction for logger implementations.
pub trait Log {
    fn log(&self, verbosity: Verbosity, message: &str);
}

/// Extension methods on `Log` for common bumpversion log patterns.
pub trait LogExt {
    /// Log a file modification: the path, and either a diff of `before`/`after` or "not modified".
    fn log_modification(&self, path: &std::path::Path, before: &str, after: Option<&str>);

    /// Log configured hooks with their names (e.g., 'setup', 'pre-commit').
    fn log_hooks(&self, hook_name: &str, hooks: &[String]);
}

impl<T> LogExt for T
where
    T: Log,
{
    fn log_modification(&self, path: &std::path::Path, before: &str, after: Option<&str>) {
        self.log(
            Verbosity::Low,
            &format!("{}", format!("[{}]", path.to_string_lossy()).magenta()),
        );

        let Some(after) = after else {
            self.log(Verbosity::Low, "\tnot modified");
            return;
        };
        if before == after {
            self.log(Verbosity::Low, &format!("{}", "\tno changes".dimmed()));
            return;
        }
        let diff = similar_asserts::SimpleDiff::from_str(before, after, "before", "after");
        self.log(Verbosity::Low, "");
        for line in diff.to_string().lines() {
            let mut line = format!("\t{line}");
            line.push_str("\x1b[0;0m");
            self.log(Verbosity::Low, &line);
        }
    }

    fn log_hooks(&self, name: &str, hooks: &[String]) {
        self.log(Verbosity::Low, &format!("{}", format!("[{name}]").magenta()));
        if hooks.is_empty() {
            self.log(Verbosity::Low, &format!("\t{}", format!("no {name} hooks defined").dimmed()));
        }
        for hook in hooks {
            self.log(Verbosity::Low, &format!("\t{} {}", "running".dimmed(), hook));
        }
    }
}

pub(crate) fn format_version(version: &Version, color: Color) -> String {
    version
        .iter()
        .map(|(comp_name, value)| format!("{}={}", comp_name.color(color), value.value().unwrap_or("?")))
        .collect::<Vec<_>>()
        .join("  ")
}
