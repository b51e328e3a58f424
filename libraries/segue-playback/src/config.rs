//! Layered configuration loading
//!
//! Defaults, then an optional TOML file, then `SEGUE_`-prefixed environment
//! variables (e.g. `SEGUE_GAP_THRESHOLD_SECS=1.5`).

use crate::error::{PlaybackError, Result};
use crate::types::PlaybackConfig;
use std::path::Path;

const ENV_PREFIX: &str = "SEGUE";

impl PlaybackConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if path.exists() {
                settings = settings.add_source(config::File::from(path));
            } else {
                tracing::debug!("Config file {} not found, using defaults", path.display());
            }
        }

        settings = settings.add_source(config::Environment::with_prefix(prefix).try_parsing(true));

        let config = settings
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.gap_threshold_secs.is_finite() || self.gap_threshold_secs < 0.0 {
            return Err(PlaybackError::Config(format!(
                "gap_threshold_secs must be a non-negative number, got {}",
                self.gap_threshold_secs
            )));
        }

        if !self.previous_restart_secs.is_finite() || self.previous_restart_secs < 0.0 {
            return Err(PlaybackError::Config(format!(
                "previous_restart_secs must be a non-negative number, got {}",
                self.previous_restart_secs
            )));
        }

        if self.poll_interval_ms == 0 || self.now_playing_interval_ms == 0 {
            return Err(PlaybackError::Config(
                "poll and now-playing intervals must be greater than zero".to_string(),
            ));
        }

        // The selector flip must not happen before the standby buffer starts.
        if self.settle_delay_ms <= self.lookahead_ms {
            return Err(PlaybackError::Config(format!(
                "settle_delay_ms ({}) must exceed lookahead_ms ({})",
                self.settle_delay_ms, self.lookahead_ms
            )));
        }

        if self.event_capacity == 0 || self.command_capacity == 0 {
            return Err(PlaybackError::Config(
                "channel capacities must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
