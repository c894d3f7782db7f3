// Task re-checking the lead after each switch

use std::sync::Arc;

use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};

use crate::dispatcher::SwitchCompletion;

use super::AdmissionController;

/// Spawns the task reconciling switch completions with the queue
///
/// # Arguments
///
/// * `controller` - The admission controller
/// * `receiver` - Receiver of switch completions from the dispatcher
pub fn spawn_task_switch_reconciler(
    controller: Arc<AdmissionController>,
    mut receiver: UnboundedReceiver<SwitchCompletion>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(completion) = receiver.recv().await {
            controller.reconcile(completion.target.as_deref()).await;
        }
    })
}
