// Publisher kicker

use std::sync::Arc;

use reqwest::StatusCode;

use crate::{
    composer::ComposerError, log::Logger, log_debug, log_info, utils::render_key_template,
};

use super::{
    make_kick_jwt, HttpKickConfiguration, KickConfiguration, KickMode, RedisKickConfiguration,
};

/// Disconnects publishers from the ingest server
pub struct PublisherKicker {
    logger: Arc<Logger>,
    config: KickConfiguration,
    http_client: reqwest::Client,
}

impl PublisherKicker {
    /// Creates new PublisherKicker
    pub fn new(logger: Arc<Logger>, config: KickConfiguration) -> PublisherKicker {
        PublisherKicker {
            logger,
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Kicks the publisher of a stream key
    ///
    /// Fails with a timeout error if the ingest server does not answer
    /// within the configured limit.
    pub async fn kick(&self, key: &str) -> Result<(), ComposerError> {
        let request = match (&self.config.mode, &self.config.redis, &self.config.http) {
            (KickMode::Redis, Some(redis_config), _) => {
                tokio::time::timeout(self.config.timeout, self.kick_redis(redis_config, key)).await
            }
            (KickMode::Http, _, Some(http_config)) => {
                tokio::time::timeout(self.config.timeout, self.kick_http(http_config, key)).await
            }
            _ => {
                log_info!(
                    self.logger,
                    format!("Kicking is disabled, {} stays connected", key)
                );

                return Ok(());
            }
        };

        match request {
            Ok(r) => r,
            Err(_) => Err(ComposerError::Timeout(format!(
                "kick of {} after {} ms",
                key,
                self.config.timeout.as_millis()
            ))),
        }
    }

    async fn kick_redis(
        &self,
        config: &RedisKickConfiguration,
        key: &str,
    ) -> Result<(), ComposerError> {
        let client = redis::Client::open(config.get_redis_url())
            .map_err(|e| ComposerError::Kick(format!("could not create a Redis client: {}", e)))?;

        let mut connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| ComposerError::Kick(format!("could not connect to Redis: {}", e)))?;

        let command = render_key_template(&config.command, key);

        log_debug!(
            self.logger,
            format!("PUBLISH {} {}", &config.channel, &command)
        );

        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&config.channel)
            .arg(&command)
            .query_async(&mut connection)
            .await
            .map_err(|e| ComposerError::Kick(format!("PUBLISH failed: {}", e)))?;

        if receivers == 0 {
            return Err(ComposerError::Kick(format!(
                "nobody is subscribed to {}",
                &config.channel
            )));
        }

        Ok(())
    }

    async fn kick_http(&self, config: &HttpKickConfiguration, key: &str) -> Result<(), ComposerError> {
        let url = render_key_template(&config.url, key);

        log_debug!(self.logger, format!("POST {} | Event: KICK", url));

        let token = make_kick_jwt(&self.logger, config, key);

        let response = self
            .http_client
            .post(&url)
            .header("rtmp-event", token)
            .send()
            .await
            .map_err(|e| ComposerError::Kick(format!("request failed: {}", e)))?;

        if response.status() != StatusCode::OK {
            return Err(ComposerError::Kick(format!(
                "kick endpoint returned status code {}",
                response.status().as_u16()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_kick_disabled_is_ok() {
        let kicker = PublisherKicker::new(
            Arc::new(Logger::new_disabled()),
            KickConfiguration::disabled(),
        );

        assert_eq!(kicker.kick("abc").await, Ok(()));
    }

    #[tokio::test]
    async fn test_kick_times_out_on_silent_endpoint() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accepts connections and never answers
        tokio::spawn(async move {
            let mut open = Vec::new();

            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let config = KickConfiguration {
            mode: KickMode::Http,
            redis: None,
            http: Some(HttpKickConfiguration {
                url: format!("http://{}/kick/{{key}}", addr),
                jwt_secret: "secret".to_string(),
                jwt_subject: "rtmp_kick".to_string(),
            }),
            timeout: std::time::Duration::from_millis(200),
        };

        let kicker = PublisherKicker::new(Arc::new(Logger::new_disabled()), config);

        let started = std::time::Instant::now();
        let result = kicker.kick("abc").await;

        assert!(matches!(result, Err(ComposerError::Timeout(_))));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}
