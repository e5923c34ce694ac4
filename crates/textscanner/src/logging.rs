//! Log output for the `txtscan` binary.
//!
//! The library emits `tracing` events under its own target and the binary
//! under `txtscan`. [`init_logging`] turns both on at the level picked by the
//! `-q`/`-v` flags unless `RUST_LOG` names a filter of its own. Events are
//! written to stderr; stdout carries recognized text only.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Targets enabled by the default filter.
const LOG_TARGETS: [&str; 2] = ["textscanner", "txtscan"];

/// How much `txtscan` reports about its own work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only (`-q`).
    Quiet,
    /// Image loads, OCR runs and camera state changes.
    #[default]
    Normal,
    /// Adds ffmpeg invocations, pump drops and status changes (`-v`).
    Verbose,
    /// Adds every detected text box (`-vv`).
    Trace,
}

impl Verbosity {
    /// The most detailed level shown.
    #[must_use]
    pub fn to_level_filter(&self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Derive verbosity from `-q` and the number of `-v` flags.
    ///
    /// Quiet wins over any number of `-v`.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Trace,
        }
    }
}

/// The filter used when `RUST_LOG` is unset, e.g. `textscanner=INFO,txtscan=INFO`.
fn filter_directive(verbosity: Verbosity) -> String {
    let level = verbosity.to_level_filter();
    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Pick the filter: a valid non-empty `RUST_LOG` value, else the verbosity default.
fn select_filter(rust_log: Option<&str>, verbosity: Verbosity) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(filter_directive(verbosity)))
}

/// Install the stderr subscriber.
///
/// Call once at startup. Later calls leave the first subscriber in place.
///
/// ```no_run
/// use textscanner::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::from_flags(false, 1));
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = select_filter(rust_log.as_deref(), verbosity);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_per_verbosity() {
        assert_eq!(Verbosity::Quiet.to_level_filter(), Level::ERROR);
        assert_eq!(Verbosity::default().to_level_filter(), Level::INFO);
        assert_eq!(Verbosity::Verbose.to_level_filter(), Level::DEBUG);
        assert_eq!(Verbosity::Trace.to_level_filter(), Level::TRACE);
    }

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 2), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(false, 9), Verbosity::Trace);
    }

    #[test]
    fn test_filter_covers_library_and_binary() {
        assert_eq!(
            filter_directive(Verbosity::Normal),
            "textscanner=INFO,txtscan=INFO"
        );
        assert_eq!(
            filter_directive(Verbosity::Quiet),
            "textscanner=ERROR,txtscan=ERROR"
        );
    }

    #[test]
    fn test_rust_log_overrides_flags() {
        let filter = select_filter(Some("textscanner::camera=trace"), Verbosity::Quiet);
        let shown = filter.to_string().to_lowercase();
        assert!(shown.contains("textscanner::camera=trace"), "{shown}");
        assert!(!shown.contains("error"), "{shown}");
    }

    #[test]
    fn test_bad_rust_log_falls_back_to_flags() {
        let filter = select_filter(Some("textscanner=loud"), Verbosity::Verbose);
        let shown = filter.to_string().to_lowercase();
        assert!(shown.contains("textscanner=debug"), "{shown}");
        assert!(shown.contains("txtscan=debug"), "{shown}");

        let filter = select_filter(None, Verbosity::Trace);
        assert!(filter.to_string().to_lowercase().contains("txtscan=trace"));

        let filter = select_filter(Some("  "), Verbosity::Normal);
        assert!(filter.to_string().to_lowercase().contains("textscanner=info"));
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(Verbosity::Quiet);
        init_logging(Verbosity::Trace);
    }
}
