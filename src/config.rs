//! Configuration types for CLI verbosity and logging.

use tracing_subscriber::EnvFilter;

/// Runtime configuration derived from CLI arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Controls the verbosity level of CLI output.
    pub verbosity: Verbosity,
}

impl Config {
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Default tracing directive for this verbosity.
    ///
    /// External commands are logged at `debug` and warnings at `warn`. Both
    /// already reach the user through the summary, so only verbose mode
    /// turns them on.
    #[must_use]
    pub fn log_directive(&self) -> &'static str {
        match self.verbosity {
            Verbosity::Quiet => "off",
            Verbosity::Normal => "error",
            Verbosity::Verbose => "debug",
        }
    }

    /// Builds the tracing filter, letting `RUST_LOG` override the default.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.log_directive()))
    }

    /// Installs the global tracing subscriber, writing to stderr.
    ///
    /// Safe to call more than once; later calls are ignored.
    pub fn init_logging(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .try_init();
    }
}

/// Verbosity level for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}
