//! Console logger for the bumpversion CLI, implementing [`bumpversion::logging::Log`].
//!
//! Prints messages to stdout, with an optional dry-run prefix.
use bumpversion::logging::Verbosity;
use colored::Colorize;

/// Logger for CLI output; respects verbosity and dry-run mode.
pub(crate) struct Logger {
    dry_run: bool,
    verbosity: Verbosity,
}

impl Logger {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity, dry_run: false }
    }

    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }
}

impl bumpversion::logging::Log for Logger {
    fn log(&self, verbosity: Verbosity, message: &str) {
        if verbosity > self.verbosity {
            return;
        }
        if self.dry_run {
            println!("{}{}", " [DRY-RUN] ".blue(), message);
        } else {
            println!("{message}");
        }
    }
}

/// Logger backing `--list`: passes through only the plain `current_version=`/`new_version=`
/// lines `bump` emits for machine consumers, swallowing the human-readable messages.
pub(crate) struct ListLogger;

impl bumpversion::logging::Log for ListLogger {
    fn log(&self, _verbosity: Verbosity, message: &str) {
        if message.starts_with("current_version=") || message.starts_with("new_version=") {
            println!("{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpversion::logging::Log;

    #[test]
    fn dry_run_builder_toggles_prefix_state() {
        let logger = Logger::new(Verbosity::Low).dry_run(true);
        assert!(logger.dry_run);
        assert_eq!(logger.verbosity, Verbosity::Low);
    }

    #[test]
    fn list_logger_ignores_unrecognized_messages() {
        let logger = ListLogger;
        logger.log(Verbosity::Low, "version unchanged, nothing to do");
    }
}
