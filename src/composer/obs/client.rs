// OBS client connection logic

use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::Mutex};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tungstenite::{Message, Utf8Bytes};

use crate::{log::Logger, log_debug, log_error, log_info, log_trace, log_warning};

use super::{
    make_obs_auth_string, spawn_task_obs_heartbeat, ObsClientStatus, ObsConnectionConfig,
    ObsHello, ObsIdentify, ObsMessage, ObsRequestResponse, OBS_RPC_VERSION, OP_EVENT, OP_HELLO,
    OP_IDENTIFIED, OP_IDENTIFY, OP_REQUEST_RESPONSE,
};

/// Timeout for read operations
const READ_TIMEOUT_SECONDS: u64 = 60;

/// Timeout for the identification handshake
const HANDSHAKE_TIMEOUT_SECONDS: u64 = 10;

type ObsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Spawns task to communicate with OBS
///
/// # Arguments
///
/// * `logger` - The logger
/// * `config` - The connection configuration
/// * `status` - The client status
pub fn spawn_task_obs_client(
    logger: Arc<Logger>,
    config: Arc<ObsConnectionConfig>,
    status: Arc<Mutex<ObsClientStatus>>,
) {
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match connect_async(config.connection_url.as_str()).await {
                Ok(r) => r,
                Err(e) => {
                    log_error!(logger, format!("Could not connect to OBS: {}", e));

                    tokio::time::sleep(config.reconnect_interval).await;

                    continue;
                }
            };

            if let Err(e) = identify(&logger, &config, &mut stream).await {
                log_error!(logger, format!("Identification failed: {}", e));

                _ = stream.close(None).await;

                tokio::time::sleep(config.reconnect_interval).await;

                continue;
            }

            log_info!(logger, format!("Connected: {}", &config.connection_url));

            // Split the stream so multiple tasks can use it

            let (write_stream, mut read_stream) = stream.split();

            let write_stream_mu = Arc::new(Mutex::new(write_stream));

            ObsClientStatus::set_connected(&status, write_stream_mu.clone()).await;

            let (cancel_heartbeat_sender, cancel_heartbeat_receiver) =
                tokio::sync::mpsc::channel::<()>(1);

            spawn_task_obs_heartbeat(logger.clone(), write_stream_mu, cancel_heartbeat_receiver);

            // Read messages

            loop {
                let msg = match tokio::time::timeout(
                    Duration::from_secs(READ_TIMEOUT_SECONDS),
                    read_stream.next(),
                )
                .await
                {
                    Ok(Some(Ok(m))) => m,
                    Ok(Some(Err(e))) => {
                        log_error!(logger, format!("Disconnected from OBS: {}", e));
                        break;
                    }
                    Ok(None) => {
                        log_error!(logger, "Connection closed by OBS");
                        break;
                    }
                    Err(_) => {
                        log_error!(logger, "Connection timed out");
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => {
                        handle_text_message(&logger, &status, &text).await;
                    }
                    Message::Close(_) => {
                        log_info!(logger, "Connection closed by OBS");
                        break;
                    }
                    _ => {}
                }
            }

            // Disconnected

            ObsClientStatus::set_disconnected(&status).await;

            _ = cancel_heartbeat_sender.send(()).await;

            tokio::time::sleep(config.reconnect_interval).await;
        }
    });
}

/// Handles a text message received after identification
async fn handle_text_message(logger: &Logger, status: &Mutex<ObsClientStatus>, text: &str) {
    log_trace!(logger, format!("RECEIVED: {}", text));

    let msg = match ObsMessage::parse(text) {
        Some(m) => m,
        None => {
            log_debug!(logger, "Received a message that is not valid JSON");
            return;
        }
    };

    match msg.op {
        OP_REQUEST_RESPONSE => {
            let response: ObsRequestResponse = match msg.data() {
                Some(r) => r,
                None => {
                    log_warning!(logger, "Received an invalid request response");
                    return;
                }
            };

            match response.request_id.parse::<u64>() {
                Ok(id) => {
                    ObsClientStatus::complete_request(status, id, response).await;
                }
                Err(_) => {
                    log_warning!(
                        logger,
                        format!(
                            "Received a response with an invalid requestId: {}",
                            &response.request_id
                        )
                    );
                }
            }
        }
        OP_EVENT => {}
        op => {
            log_debug!(logger, format!("Unrecognized op code: {}", op));
        }
    }
}

/// Runs the Hello / Identify / Identified handshake
async fn identify(
    logger: &Logger,
    config: &ObsConnectionConfig,
    stream: &mut ObsStream,
) -> Result<(), String> {
    let hello_msg = read_handshake_message(stream, OP_HELLO).await?;

    let hello: ObsHello = hello_msg
        .data()
        .ok_or_else(|| "invalid Hello message".to_string())?;

    log_debug!(
        logger,
        format!(
            "OBS websocket version {}, RPC version {}",
            &hello.obs_web_socket_version, hello.rpc_version
        )
    );

    let authentication = match &hello.authentication {
        Some(challenge) => {
            if config.password.is_empty() {
                return Err("OBS requires a password, but OBS_PASSWORD is empty".to_string());
            }

            Some(make_obs_auth_string(
                &config.password,
                &challenge.salt,
                &challenge.challenge,
            ))
        }
        None => None,
    };

    let identify = ObsMessage::new(
        OP_IDENTIFY,
        &ObsIdentify {
            rpc_version: OBS_RPC_VERSION,
            authentication,
            event_subscriptions: 0,
        },
    );

    stream
        .send(Message::Text(Utf8Bytes::from(identify.serialize())))
        .await
        .map_err(|e| e.to_string())?;

    read_handshake_message(stream, OP_IDENTIFIED).await?;

    Ok(())
}

/// Reads the next text message of the handshake,
/// expecting a specific op code
async fn read_handshake_message(stream: &mut ObsStream, expected_op: u8) -> Result<ObsMessage, String> {
    loop {
        let msg = match tokio::time::timeout(
            Duration::from_secs(HANDSHAKE_TIMEOUT_SECONDS),
            stream.next(),
        )
        .await
        {
            Ok(Some(Ok(m))) => m,
            Ok(Some(Err(e))) => return Err(e.to_string()),
            Ok(None) => return Err("connection closed".to_string()),
            Err(_) => return Err("handshake timed out".to_string()),
        };

        match msg {
            Message::Text(text) => {
                let parsed = ObsMessage::parse(&text)
                    .ok_or_else(|| "received a message that is not valid JSON".to_string())?;

                if parsed.op != expected_op {
                    return Err(format!(
                        "expected op code {}, received {}",
                        expected_op, parsed.op
                    ));
                }

                return Ok(parsed);
            }
            Message::Close(frame) => {
                return Err(match frame {
                    Some(f) => format!("closed by OBS ({}): {}", u16::from(f.code), f.reason.as_str()),
                    None => "closed by OBS".to_string(),
                });
            }
            _ => {}
        }
    }
}
