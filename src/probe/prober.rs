// Output reachability probes

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{log::Logger, log_debug};

/// Checks whether the broadcast output is reachable
#[async_trait]
pub trait OutputProber: Send + Sync {
    /// Probes the URL, giving up after `timeout`
    ///
    /// Returns true if reachable
    async fn probe_reachable(&self, url: &str, timeout: Duration) -> bool;
}

/// Prober making HTTP GET requests.
/// Any 2xx status counts as reachable.
pub struct HttpProber {
    logger: Arc<Logger>,
    client: reqwest::Client,
}

impl HttpProber {
    /// Creates new HttpProber
    pub fn new(logger: Arc<Logger>) -> HttpProber {
        HttpProber {
            logger,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl OutputProber for HttpProber {
    async fn probe_reachable(&self, url: &str, timeout: Duration) -> bool {
        let response = self.client.get(url).timeout(timeout).send().await;

        match response {
            Ok(r) => {
                if !r.status().is_success() {
                    log_debug!(
                        self.logger,
                        format!("Probe of {} resulted in status code: {}", url, r.status().as_u16())
                    );

                    return false;
                }

                true
            }
            Err(e) => {
                log_debug!(self.logger, format!("Probe of {} resulted in error: {}", url, e));

                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_url() {
        let prober = HttpProber::new(Arc::new(Logger::new_disabled()));

        // Nothing listens on port 9 of the loopback interface
        assert!(
            !prober
                .probe_reachable("http://127.0.0.1:9/output.m3u8", Duration::from_millis(500))
                .await
        );
    }
}
