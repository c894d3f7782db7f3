// Media composer backed by OBS

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

use crate::{
    composer::{kick::PublisherKicker, ComposerError, InputStatus, MediaComposer},
    log::Logger,
    log_debug,
};

use super::{ObsClientStatus, ObsConnectionConfig, ObsMessage};

/// Media composer driving an OBS scene through obs-websocket
pub struct ObsComposer {
    logger: Arc<Logger>,
    config: Arc<ObsConnectionConfig>,
    status: Arc<Mutex<ObsClientStatus>>,
    kicker: PublisherKicker,

    /// Scene item IDs of the inputs created by this composer
    scene_items: Mutex<HashMap<String, i64>>,
}

impl ObsComposer {
    /// Creates new ObsComposer
    ///
    /// The connection itself is handled by the task
    /// spawned with `spawn_task_obs_client`, sharing `status`
    pub fn new(
        logger: Arc<Logger>,
        config: Arc<ObsConnectionConfig>,
        status: Arc<Mutex<ObsClientStatus>>,
        kicker: PublisherKicker,
    ) -> ObsComposer {
        ObsComposer {
            logger,
            config,
            status,
            kicker,
            scene_items: Mutex::new(HashMap::new()),
        }
    }

    /// Sends a request and waits for its response
    ///
    /// # Return value
    ///
    /// Returns the response data, if any
    async fn request(&self, request_type: &str, data: Value) -> Result<Option<Value>, ComposerError> {
        let (response_sender, response_receiver) = oneshot::channel();

        let req_id = ObsClientStatus::add_request(&self.status, response_sender)
            .await
            .ok_or_else(|| ComposerError::Unavailable("not connected to OBS".to_string()))?;

        log_debug!(self.logger, format!("{} #{}", request_type, req_id));

        let msg = ObsMessage::request(request_type, req_id, Some(data));

        if !ObsClientStatus::send_message(&self.status, msg, &self.logger).await {
            ObsClientStatus::drop_request(&self.status, req_id).await;

            return Err(ComposerError::Unavailable(format!(
                "could not send {}",
                request_type
            )));
        }

        let response = match tokio::time::timeout(self.config.request_timeout, response_receiver).await {
            Ok(Ok(r)) => r?,
            Ok(Err(_)) => {
                return Err(ComposerError::Unavailable(
                    "connection to OBS lost".to_string(),
                ));
            }
            Err(_) => {
                ObsClientStatus::drop_request(&self.status, req_id).await;

                return Err(ComposerError::Timeout(request_type.to_string()));
            }
        };

        if !response.request_status.result {
            return Err(ComposerError::Request {
                request: request_type.to_string(),
                code: response.request_status.code,
                comment: response.request_status.comment.unwrap_or_default(),
            });
        }

        Ok(response.response_data)
    }

    /// Finds the scene item of an input
    async fn scene_item_id(&self, name: &str) -> Result<i64, ComposerError> {
        if let Some(id) = self.scene_items.lock().await.get(name) {
            return Ok(*id);
        }

        let data = self
            .request(
                "GetSceneItemId",
                json!({
                    "sceneName": &self.config.scene,
                    "sourceName": name,
                }),
            )
            .await?;

        let id = response_field(&data, "sceneItemId")?
            .as_i64()
            .ok_or_else(|| ComposerError::Protocol("sceneItemId is not a number".to_string()))?;

        self.scene_items.lock().await.insert(name.to_string(), id);

        Ok(id)
    }
}

/// Gets a field of the response data
fn response_field<'a>(data: &'a Option<Value>, field: &str) -> Result<&'a Value, ComposerError> {
    data.as_ref()
        .and_then(|d| d.get(field))
        .ok_or_else(|| ComposerError::Protocol(format!("missing {} in the response", field)))
}

#[async_trait]
impl MediaComposer for ObsComposer {
    async fn create_input(&self, name: &str, url: &str) -> Result<(), ComposerError> {
        let data = self
            .request(
                "CreateInput",
                json!({
                    "sceneName": &self.config.scene,
                    "inputName": name,
                    "inputKind": &self.config.input_kind,
                    "inputSettings": {
                        "input": url,
                        "is_local_file": false,
                        "restart_on_activate": false,
                        "close_when_inactive": false,
                    },
                    "sceneItemEnabled": false,
                }),
            )
            .await?;

        let scene_item_id = response_field(&data, "sceneItemId")?
            .as_i64()
            .ok_or_else(|| ComposerError::Protocol("sceneItemId is not a number".to_string()))?;

        self.scene_items
            .lock()
            .await
            .insert(name.to_string(), scene_item_id);

        // Same depth as the previous sources, below the overlays
        self.request(
            "SetSceneItemIndex",
            json!({
                "sceneName": &self.config.scene,
                "sceneItemId": scene_item_id,
                "sceneItemIndex": self.config.layer_index,
            }),
        )
        .await?;

        Ok(())
    }

    async fn set_visible(&self, name: &str, visible: bool) -> Result<(), ComposerError> {
        let scene_item_id = self.scene_item_id(name).await?;

        self.request(
            "SetSceneItemEnabled",
            json!({
                "sceneName": &self.config.scene,
                "sceneItemId": scene_item_id,
                "sceneItemEnabled": visible,
            }),
        )
        .await?;

        Ok(())
    }

    async fn remove_input(&self, name: &str) -> Result<(), ComposerError> {
        self.scene_items.lock().await.remove(name);

        self.request("RemoveInput", json!({ "inputName": name }))
            .await?;

        Ok(())
    }

    async fn get_input_status(&self, name: &str) -> Result<InputStatus, ComposerError> {
        let data = self
            .request("GetMediaInputStatus", json!({ "inputName": name }))
            .await?;

        let state = response_field(&data, "mediaState")?
            .as_str()
            .ok_or_else(|| ComposerError::Protocol("mediaState is not a string".to_string()))?;

        Ok(InputStatus::from_obs_media_state(state))
    }

    async fn kick_publisher(&self, key: &str) -> Result<(), ComposerError> {
        self.kicker.kick(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::kick::KickConfiguration;
    use std::time::Duration;

    fn make_composer() -> ObsComposer {
        let logger = Arc::new(Logger::new_disabled());

        ObsComposer::new(
            logger.clone(),
            Arc::new(ObsConnectionConfig {
                connection_url: "ws://127.0.0.1:4455".to_string(),
                password: "".to_string(),
                scene: "Scene".to_string(),
                input_kind: "ffmpeg_source".to_string(),
                layer_index: 0,
                request_timeout: Duration::from_millis(100),
                reconnect_interval: Duration::from_secs(1),
            }),
            Arc::new(Mutex::new(ObsClientStatus::new())),
            PublisherKicker::new(logger, KickConfiguration::disabled()),
        )
    }

    #[tokio::test]
    async fn test_requests_fail_when_disconnected() {
        let composer = make_composer();

        let err = composer.create_input("a", "rtmp://relay/a").await.unwrap_err();
        assert!(err.is_unavailable());

        let err = composer.get_input_status("a").await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_response_field() {
        let data = Some(json!({ "sceneItemId": 5 }));

        assert_eq!(response_field(&data, "sceneItemId").unwrap().as_i64(), Some(5));
        assert!(matches!(
            response_field(&data, "mediaState"),
            Err(ComposerError::Protocol(_))
        ));
        assert!(response_field(&None, "sceneItemId").is_err());
    }
}
