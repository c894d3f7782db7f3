// Shared state of the hooks server

use std::sync::Arc;

use crate::{
    admission::AdmissionController, dispatcher::DispatcherConfiguration, health::HealthThreshold,
    log::Logger,
};

use super::HooksServerConfiguration;

/// State shared by the route handlers
pub struct HooksContext {
    pub logger: Arc<Logger>,
    pub config: HooksServerConfiguration,
    pub controller: Arc<AdmissionController>,

    /// Used to build the relay URLs returned by on_forward
    pub dispatcher_config: DispatcherConfiguration,

    pub health_threshold: HealthThreshold,
}
