use crate::error::TelemetryError;
use crate::metrics::Metrics;
use tracing::{debug, Level};

/// Logging and metrics settings chosen on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryConfig {
    pub verbose: bool,
    pub debug: bool,
}

impl TelemetryConfig {
    pub fn log_level(&self) -> Level {
        if self.debug {
            Level::TRACE
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

/// Install the fmt subscriber on stderr, leaving stdout for command output.
pub fn init_logging(config: TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| TelemetryError::LoggingSetup(e.to_string()))
}

/// Set up logging and register the metric instruments.
///
/// Instruments report to the global meter provider, which is a no-op until
/// an exporter installs one.
pub fn init_telemetry(config: TelemetryConfig) -> Result<&'static Metrics, TelemetryError> {
    init_logging(config)?;
    let metrics = Metrics::init();
    debug!("Telemetry initialized at level {}", config.log_level());
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_flags() {
        assert_eq!(TelemetryConfig::default().log_level(), Level::INFO);
        assert_eq!(
            TelemetryConfig { verbose: true, debug: false }.log_level(),
            Level::DEBUG
        );
        assert_eq!(
            TelemetryConfig { verbose: true, debug: true }.log_level(),
            Level::TRACE
        );
    }

    #[test]
    fn test_second_init_reports_error() {
        let config = TelemetryConfig::default();
        let _ = init_logging(config);
        let second = init_logging(config);
        assert!(matches!(second, Err(TelemetryError::LoggingSetup(_))));
    }
}
