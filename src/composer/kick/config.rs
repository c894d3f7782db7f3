// Publisher kick configuration

use std::time::Duration;

use crate::{
    log::Logger,
    log_error, log_warning,
    utils::{get_env_bool, get_env_millis, get_env_string, get_env_u32, KEY_PLACEHOLDER},
};

/// Default limit for a kick request, in milliseconds
const DEFAULT_KICK_TIMEOUT_MS: u64 = 5000;

/// Way to reach the ingest server to disconnect a publisher
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KickMode {
    /// Kicking is not possible, evictions only switch the output
    Disabled,

    /// Publish a command on a Redis channel
    Redis,

    /// POST to an HTTP endpoint
    Http,
}

/// Redis connection used to send kick commands
#[derive(Clone)]
pub struct RedisKickConfiguration {
    /// Redis host
    pub host: String,

    /// Redis port
    pub port: u32,

    // Password
    pub password: String,

    /// Channel to publish to
    pub channel: String,

    /// Use TLS?
    pub tls: bool,

    /// Command template, {key} is replaced by the stream key
    pub command: String,
}

impl RedisKickConfiguration {
    /// Gets redis URL based on the parameters
    pub fn get_redis_url(&self) -> String {
        // {redis|rediss}://[<username>][:<password>@]<hostname>[:port][/<db>]

        let proto = if self.tls { "rediss" } else { "redis" };

        let password_part = if self.password.is_empty() {
            "".to_string()
        } else {
            format!(":{}@", self.password)
        };

        format!("{}://{}{}:{}", proto, password_part, self.host, self.port)
    }
}

/// HTTP endpoint used to send kick requests
#[derive(Clone)]
pub struct HttpKickConfiguration {
    /// URL template, {key} is replaced by the stream key
    pub url: String,

    /// Secret to sign the request token
    pub jwt_secret: String,

    /// Subject of the request token
    pub jwt_subject: String,
}

/// Kick configuration
#[derive(Clone)]
pub struct KickConfiguration {
    pub mode: KickMode,
    pub redis: Option<RedisKickConfiguration>,
    pub http: Option<HttpKickConfiguration>,

    /// Limit for a whole kick request, connection included
    pub timeout: Duration,
}

impl KickConfiguration {
    /// Configuration with kicking disabled
    pub fn disabled() -> KickConfiguration {
        KickConfiguration {
            mode: KickMode::Disabled,
            redis: None,
            http: None,
            timeout: Duration::from_millis(DEFAULT_KICK_TIMEOUT_MS),
        }
    }

    /// Loads kick configuration
    /// from environment variables
    pub fn load_from_env(logger: &Logger) -> Result<KickConfiguration, ()> {
        let mode_str = get_env_string("KICK_MODE", "none").to_lowercase();

        let timeout = get_env_millis("KICK_TIMEOUT_MS", DEFAULT_KICK_TIMEOUT_MS);

        if timeout.is_zero() {
            log_error!(logger, "KICK_TIMEOUT_MS must be greater than zero");
            return Err(());
        }

        match mode_str.as_str() {
            "" | "none" | "disabled" => Ok(KickConfiguration {
                timeout,
                ..KickConfiguration::disabled()
            }),
            "redis" => {
                let port = get_env_u32("REDIS_PORT", 6379);

                if port == 0 || port > 65535 {
                    log_error!(logger, format!("REDIS_PORT has an invalid value: {}", port));
                    return Err(());
                }

                let command = get_env_string(
                    "KICK_REDIS_COMMAND",
                    &format!("kill-session>{}", KEY_PLACEHOLDER),
                );

                Ok(KickConfiguration {
                    mode: KickMode::Redis,
                    redis: Some(RedisKickConfiguration {
                        host: get_env_string("REDIS_HOST", "127.0.0.1"),
                        port,
                        password: get_env_string("REDIS_PASSWORD", ""),
                        channel: get_env_string("REDIS_CHANNEL", "rtmp_commands"),
                        tls: get_env_bool("REDIS_TLS", false),
                        command,
                    }),
                    http: None,
                    timeout,
                })
            }
            "http" => {
                let kick_url = get_env_string("KICK_URL", "");

                if url::Url::parse(&kick_url.replace(KEY_PLACEHOLDER, "key")).is_err() {
                    log_error!(
                        logger,
                        format!("KICK_URL has an invalid value: {}", kick_url)
                    );
                    return Err(());
                }

                let jwt_secret = get_env_string("KICK_JWT_SECRET", "");

                if jwt_secret.is_empty() {
                    log_warning!(logger, "KICK_JWT_SECRET is empty. Make sure to set a secure JWT secret to prevent security issues.");
                }

                Ok(KickConfiguration {
                    mode: KickMode::Http,
                    redis: None,
                    http: Some(HttpKickConfiguration {
                        url: kick_url,
                        jwt_secret,
                        jwt_subject: get_env_string("KICK_JWT_SUBJECT", "rtmp_kick"),
                    }),
                    timeout,
                })
            }
            _ => {
                log_error!(logger, format!("KICK_MODE has an invalid value: {}", mode_str));
                Err(())
            }
        }
    }
}
