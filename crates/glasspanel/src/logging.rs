//! Logging setup.
//!
//! Registry and dashboard failures are reported only through logging, so the
//! subscriber installed here is the sole place they become visible. Output
//! goes to stderr; stdout carries frame readouts.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding a filter for this program only. Takes
/// precedence over `RUST_LOG`.
pub const LOG_ENV: &str = "GLASSPANEL_LOG";

/// Modules that log once per path, update or frame.
const CHATTY_MODULES: [&str; 3] = [
    "glasspanel::registry",
    "glasspanel::property",
    "glasspanel::dashboard",
];

/// Verbosity level for logging output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above, with registry, property and dashboard held at info.
    Verbose,
    /// Everything, including per-update and per-frame traces.
    Trace,
}

impl Verbosity {
    /// Level of the crate-wide directive.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directives used when neither `GLASSPANEL_LOG` nor `RUST_LOG`
    /// is set.
    #[must_use]
    pub fn directives(&self) -> String {
        let mut directives = format!("glasspanel={}", self.to_level_filter());
        if *self == Self::Verbose {
            for module in CHATTY_MODULES {
                directives.push_str(&format!(",{module}=info"));
            }
        }
        directives
    }
}

fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(verbosity.directives()))
}

/// Install the global subscriber. Later calls are ignored.
///
/// # Examples
///
/// ```no_run
/// use glasspanel::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let show_targets = matches!(verbosity, Verbosity::Verbose | Verbosity::Trace);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter(verbosity))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(show_targets)
                .with_line_number(verbosity == Verbosity::Trace),
        );

    let _ = subscriber.try_init();
}

/// Logging for tests, written through the test harness.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("glasspanel=warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_to_level() {
        assert_eq!(Verbosity::Quiet.to_level_filter(), Level::ERROR);
        assert_eq!(Verbosity::Normal.to_level_filter(), Level::INFO);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level_filter(), Level::TRACE);
    }

    #[test]
    fn test_directives() {
        assert_eq!(Verbosity::Quiet.directives(), "glasspanel=ERROR");
        assert_eq!(Verbosity::Normal.directives(), "glasspanel=INFO");
        assert_eq!(Verbosity::Trace.directives(), "glasspanel=TRACE");

        let verbose = Verbosity::Verbose.directives();
        assert!(verbose.starts_with("glasspanel=DEBUG,"));
        assert!(verbose.contains("glasspanel::registry=info"));
        assert!(verbose.contains("glasspanel::dashboard=info"));
    }

    #[test]
    fn test_directives_parse() {
        for v in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Trace,
        ] {
            assert!(EnvFilter::try_new(v.directives()).is_ok());
        }
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(Verbosity::Quiet);
        init_logging(Verbosity::Trace);
    }
}
