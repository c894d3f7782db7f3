// Health monitor configuration

use std::time::Duration;

use url::Url;

use crate::{
    log::Logger,
    log_error,
    utils::{get_env_bool, get_env_millis, get_env_string},
};

/// Health monitor configuration
#[derive(Clone)]
pub struct HealthConfiguration {
    /// True to run the monitor
    pub enabled: bool,

    /// URL of the broadcast output to probe
    pub output_probe_url: String,

    /// Interval between probes
    pub interval: Duration,

    /// Timeout of each probe
    pub probe_timeout: Duration,

    /// Continuous failure time before evicting the lead
    pub failure_threshold: Duration,
}

impl HealthConfiguration {
    /// Loads health monitor configuration
    /// from environment variables
    pub fn load_from_env(logger: &Logger) -> Result<HealthConfiguration, ()> {
        let output_probe_url = get_env_string("OUTPUT_PROBE_URL", "");

        if !output_probe_url.is_empty() && Url::parse(&output_probe_url).is_err() {
            log_error!(
                logger,
                format!("OUTPUT_PROBE_URL has an invalid value: {}", output_probe_url)
            );
            return Err(());
        }

        let interval = get_env_millis("HEALTH_INTERVAL_MS", 3000);

        if interval.is_zero() {
            log_error!(logger, "HEALTH_INTERVAL_MS cannot be 0");
            return Err(());
        }

        Ok(HealthConfiguration {
            enabled: get_env_bool("HEALTH_ENABLED", true) && !output_probe_url.is_empty(),
            output_probe_url,
            interval,
            probe_timeout: get_env_millis("HEALTH_PROBE_TIMEOUT_MS", 3000),
            failure_threshold: get_env_millis("HEALTH_FAILURE_THRESHOLD_MS", 30000),
        })
    }
}
