//! Logging setup
//!
//! Library code only emits `tracing` events; binaries call
//! [`init_tracing`] once to print them to stderr.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Verbosity {
    /// From `-q` and the `-v` count
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            Verbosity::Quiet
        } else {
            match verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Default filter directive when RUST_LOG is unset
    pub fn filter_directive(&self, configured: &str) -> String {
        match self {
            Verbosity::Quiet => "error".to_string(),
            Verbosity::Normal => configured.to_string(),
            Verbosity::Verbose => "agentic_rag=info,warn".to_string(),
            Verbosity::VeryVerbose => "agentic_rag=debug,info".to_string(),
        }
    }

    /// Check if should show progress spinners
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show the reasoning trace
    pub fn show_trace(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}

/// Install the global subscriber; `RUST_LOG` overrides the verbosity.
/// Calling it twice is harmless.
pub fn init_tracing(verbosity: Verbosity, configured_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive(configured_level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(Verbosity::from_flags(true, 2), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 5), Verbosity::VeryVerbose);
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(Verbosity::Normal.filter_directive("warn"), "warn");
        assert_eq!(Verbosity::Quiet.filter_directive("info"), "error");
        assert!(Verbosity::VeryVerbose.filter_directive("warn").contains("debug"));
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing(Verbosity::Quiet, "warn");
        init_tracing(Verbosity::Verbose, "warn");
    }

    #[test]
    fn test_display_flags() {
        assert!(!Verbosity::Quiet.show_progress());
        assert!(Verbosity::Verbose.show_trace());
        assert!(!Verbosity::Normal.show_trace());
    }
}
