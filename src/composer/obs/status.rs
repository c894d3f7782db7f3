// OBS client status

use std::{collections::HashMap, sync::Arc};

use futures_util::{stream::SplitSink, SinkExt};
use tokio::{
    net::TcpStream,
    sync::{oneshot, Mutex},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tungstenite::{Message, Utf8Bytes};

use crate::{composer::ComposerError, log::Logger, log_error, log_trace};

use super::{ObsMessage, ObsRequestResponse};

pub type ObsMessageSender =
    Arc<Mutex<SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>>>;

pub type ObsResponseSender = oneshot::Sender<Result<ObsRequestResponse, ComposerError>>;

/// Status of the OBS client
pub struct ObsClientStatus {
    /// Connected and identified?
    pub connected: bool,

    /// The message sender
    pub msg_sender: Option<ObsMessageSender>,

    /// Request counter
    pub request_count: u64,

    /// Requests waiting for a response
    pub pending_requests: HashMap<u64, ObsResponseSender>,
}

impl ObsClientStatus {
    /// Creates new ObsClientStatus
    pub fn new() -> ObsClientStatus {
        ObsClientStatus {
            connected: false,
            msg_sender: None,
            request_count: 0,
            pending_requests: HashMap::new(),
        }
    }

    /// Sets the status to connected
    pub async fn set_connected(status: &Mutex<ObsClientStatus>, msg_sender: ObsMessageSender) {
        let mut status_v = status.lock().await;

        status_v.connected = true;
        status_v.msg_sender = Some(msg_sender);
    }

    /// Sets the status to disconnected,
    /// failing every pending request
    pub async fn set_disconnected(status: &Mutex<ObsClientStatus>) {
        let mut status_v = status.lock().await;

        status_v.connected = false;
        status_v.msg_sender = None;

        for (_, response_sender) in status_v.pending_requests.drain() {
            _ = response_sender.send(Err(ComposerError::Unavailable(
                "connection to OBS lost".to_string(),
            )));
        }
    }

    /// Checks the connection
    pub async fn is_connected(status: &Mutex<ObsClientStatus>) -> bool {
        status.lock().await.connected
    }

    /// Sends a message
    ///
    /// Returns true on success
    pub async fn send_message(
        status: &Mutex<ObsClientStatus>,
        message: ObsMessage,
        logger: &Logger,
    ) -> bool {
        let status_v = status.lock().await;
        if !status_v.connected {
            return false;
        }

        let msg_sender = match &status_v.msg_sender {
            Some(ms) => ms.clone(),
            None => {
                return false;
            }
        };

        drop(status_v);

        send_raw_message(&msg_sender, Message::Text(Utf8Bytes::from(message.serialize())), logger)
            .await
    }

    /// Registers a request, returning its ID
    ///
    /// Returns None if not connected
    pub async fn add_request(
        status: &Mutex<ObsClientStatus>,
        response_sender: ObsResponseSender,
    ) -> Option<u64> {
        let mut status_v = status.lock().await;

        if !status_v.connected {
            return None;
        }

        status_v.request_count += 1;

        let req_id = status_v.request_count;

        status_v.pending_requests.insert(req_id, response_sender);

        Some(req_id)
    }

    /// Completes a pending request
    pub async fn complete_request(
        status: &Mutex<ObsClientStatus>,
        id: u64,
        response: ObsRequestResponse,
    ) {
        let mut status_v = status.lock().await;

        if let Some(response_sender) = status_v.pending_requests.remove(&id) {
            drop(status_v);

            _ = response_sender.send(Ok(response));
        }
    }

    /// Forgets a request that will not be waited for anymore
    pub async fn drop_request(status: &Mutex<ObsClientStatus>, id: u64) {
        status.lock().await.pending_requests.remove(&id);
    }
}

/// Sends a websocket message through the shared sink
pub async fn send_raw_message(msg_sender: &ObsMessageSender, message: Message, logger: &Logger) -> bool {
    let mut msg_sender_v = msg_sender.lock().await;

    if let Message::Text(t) = &message {
        log_trace!(logger, format!("SENT MESSAGE: {}", t.as_str()));
    }

    match msg_sender_v.send(message).await {
        Ok(_) => true,
        Err(e) => {
            log_error!(logger, format!("Could not send a message: {}", e));

            false
        }
    }
}
