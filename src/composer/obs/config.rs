// OBS connection configuration

use std::time::Duration;

use url::Url;

use crate::{
    log::Logger,
    log_error,
    utils::{get_env_millis, get_env_string, get_env_u32},
};

/// Configuration of the connection to the OBS websocket server
#[derive(Clone)]
pub struct ObsConnectionConfig {
    /// Websocket URL
    pub connection_url: String,

    /// Password, empty if authentication is disabled
    pub password: String,

    /// Scene where the dynamic sources are placed
    pub scene: String,

    /// Kind of the inputs created for each stream
    pub input_kind: String,

    /// Index in the scene's layer stack where new sources are placed.
    /// 0 is the bottom, so overlays stay on top.
    pub layer_index: u32,

    /// Max time to wait for the response to a request
    pub request_timeout: Duration,

    /// Time to wait before reconnecting
    pub reconnect_interval: Duration,
}

impl ObsConnectionConfig {
    /// Loads OBS connection configuration
    /// from environment variables
    pub fn load_from_env(logger: &Logger) -> Result<ObsConnectionConfig, ()> {
        let connection_url = get_env_string("OBS_WS_URL", "ws://127.0.0.1:4455");

        match Url::parse(&connection_url) {
            Ok(u) => {
                if u.scheme() != "ws" && u.scheme() != "wss" {
                    log_error!(
                        logger,
                        format!("OBS_WS_URL must be a ws:// or wss:// URL: {}", connection_url)
                    );
                    return Err(());
                }
            }
            Err(_) => {
                log_error!(
                    logger,
                    format!("OBS_WS_URL has an invalid value: {}", connection_url)
                );
                return Err(());
            }
        }

        let scene = get_env_string("OBS_SCENE", "Scene");

        if scene.is_empty() {
            log_error!(logger, "OBS_SCENE cannot be empty");
            return Err(());
        }

        Ok(ObsConnectionConfig {
            connection_url,
            password: get_env_string("OBS_PASSWORD", ""),
            scene,
            input_kind: get_env_string("OBS_INPUT_KIND", "ffmpeg_source"),
            layer_index: get_env_u32("OBS_SOURCE_LAYER_INDEX", 0),
            request_timeout: get_env_millis("OBS_REQUEST_TIMEOUT_MS", 5000),
            reconnect_interval: get_env_millis("OBS_RECONNECT_INTERVAL_MS", 10000),
        })
    }
}
