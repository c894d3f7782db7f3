// Job dispatcher configuration

use std::time::Duration;

use url::Url;

use crate::{
    log::Logger,
    log_error,
    utils::{get_env_millis, get_env_string, get_env_u32, render_key_template},
};

/// Job dispatcher configuration
#[derive(Clone)]
pub struct DispatcherConfiguration {
    /// Min delay between two jobs touching the composer
    pub min_delay: Duration,

    /// Interval between status polls of a new source
    pub poll_interval: Duration,

    /// Max time for a new source to reach the playing state
    pub ready_timeout: Duration,

    /// Time both sources stay visible during a switch
    pub swap_grace: Duration,

    /// Max attempts of a job while the composer is unavailable
    pub max_attempts: u32,

    /// Wait between attempts while the composer is unavailable
    pub retry_interval: Duration,

    /// Prefix for the names of the created inputs
    pub source_name_prefix: String,

    /// Relay URL of each stream, {key} is replaced by the stream key
    pub relay_url_template: String,
}

impl Default for DispatcherConfiguration {
    fn default() -> Self {
        DispatcherConfiguration {
            min_delay: Duration::from_secs(2),
            poll_interval: Duration::from_millis(500),
            ready_timeout: Duration::from_secs(15),
            swap_grace: Duration::from_secs(1),
            max_attempts: 5,
            retry_interval: Duration::from_secs(2),
            source_name_prefix: "arbiter".to_string(),
            relay_url_template: "rtmp://127.0.0.1:1935/relay/{key}".to_string(),
        }
    }
}

impl DispatcherConfiguration {
    /// Loads dispatcher configuration
    /// from environment variables
    pub fn load_from_env(logger: &Logger) -> Result<DispatcherConfiguration, ()> {
        let defaults = DispatcherConfiguration::default();

        let relay_url_template =
            get_env_string("RELAY_URL_TEMPLATE", &defaults.relay_url_template);

        if Url::parse(&render_key_template(&relay_url_template, "key")).is_err() {
            log_error!(
                logger,
                format!("RELAY_URL_TEMPLATE has an invalid value: {}", relay_url_template)
            );
            return Err(());
        }

        let poll_interval = get_env_millis("SOURCE_POLL_INTERVAL_MS", 500);

        if poll_interval.is_zero() {
            log_error!(logger, "SOURCE_POLL_INTERVAL_MS cannot be 0");
            return Err(());
        }

        let source_name_prefix = get_env_string("SOURCE_NAME_PREFIX", &defaults.source_name_prefix);

        if source_name_prefix.is_empty() {
            log_error!(logger, "SOURCE_NAME_PREFIX cannot be empty");
            return Err(());
        }

        Ok(DispatcherConfiguration {
            min_delay: get_env_millis("JOB_MIN_DELAY_MS", 2000),
            poll_interval,
            ready_timeout: get_env_millis("SOURCE_READY_TIMEOUT_MS", 15000),
            swap_grace: get_env_millis("SOURCE_SWAP_GRACE_MS", 1000),
            max_attempts: get_env_u32("JOB_MAX_ATTEMPTS", 5).max(1),
            retry_interval: get_env_millis("JOB_RETRY_INTERVAL_MS", 2000),
            source_name_prefix,
            relay_url_template,
        })
    }

    /// Gets the relay URL of a stream key
    pub fn relay_url(&self, key: &str) -> String {
        render_key_template(&self.relay_url_template, key)
    }
}
