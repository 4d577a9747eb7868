//! Log output setup for the daemon

use tracing_subscriber::EnvFilter;

use kiosk_core::{KioskError, KioskResult};

use crate::config::LoggingSection;

/// Install the global subscriber. `RUST_LOG` overrides the configured filter.
pub fn init_logging(config: &LoggingSection) -> KioskResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| KioskError::Config(format!("log filter {:?}: {}", config.filter, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().flatten_event(true).try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| KioskError::Config(format!("logging already initialised: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingSection {
            filter: "kioskd=verbose".into(),
            json: false,
        };
        assert!(init_logging(&config).is_err());
    }
}
