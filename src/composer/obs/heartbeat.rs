// Keepalive pings for the OBS connection

use std::{sync::Arc, time::Duration};

use tokio::sync::mpsc::Receiver;
use tungstenite::Message;

use crate::log::Logger;

use super::{send_raw_message, ObsMessageSender};

pub const HEARTBEAT_INTERVAL_SECONDS: u64 = 20;

/// Spawns a task to send ping frames, so the read timeout
/// does not expire on an idle connection
///
/// # Arguments
///
/// * `logger` - The logger
/// * `msg_sender` - Sink of the connection
/// * `cancel_receiver` - Receiver to listen for cancellation of the task
pub fn spawn_task_obs_heartbeat(
    logger: Arc<Logger>,
    msg_sender: ObsMessageSender,
    mut cancel_receiver: Receiver<()>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(HEARTBEAT_INTERVAL_SECONDS)) => {}
                _ = cancel_receiver.recv() => {
                    return;
                }
            }

            if !send_raw_message(&msg_sender, Message::Ping(Default::default()), &logger).await {
                return;
            }
        }
    });
}
