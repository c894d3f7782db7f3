// Main

mod admission;
mod composer;
mod context;
mod dispatcher;
mod health;
mod hooks;
mod log;
mod probe;
mod queue;
mod utils;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use composer::{
    kick::{KickConfiguration, PublisherKicker},
    obs::{spawn_task_obs_client, ObsClientStatus, ObsComposer, ObsConnectionConfig},
};
use context::{ArbiterConfiguration, ArbiterContext};
use hooks::{hooks_server, HooksContext, HooksServerConfiguration};
use log::{LogConfig, Logger};
use probe::HttpProber;
use tokio::sync::Mutex;

/// Main function
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load .env
    let _ = dotenvy::dotenv();

    // Initialize logger

    let logger = Logger::new(LogConfig::load_from_env());

    // Print version

    const VERSION: &str = env!("CARGO_PKG_VERSION");

    logger.log_info(&format!("RTMP Arbiter ({VERSION})"));

    // Load configuration

    let arbiter_config = match ArbiterConfiguration::load_from_env(&logger) {
        Ok(c) => c,
        Err(_) => {
            std::process::exit(1);
        }
    };

    let hooks_config = match HooksServerConfiguration::load_from_env(&logger) {
        Ok(c) => c,
        Err(_) => {
            std::process::exit(1);
        }
    };

    let obs_config = match ObsConnectionConfig::load_from_env(&logger) {
        Ok(c) => Arc::new(c),
        Err(_) => {
            std::process::exit(1);
        }
    };

    let kick_config = match KickConfiguration::load_from_env(&logger) {
        Ok(c) => c,
        Err(_) => {
            std::process::exit(1);
        }
    };

    // Media composer

    let obs_logger = Arc::new(logger.make_child_logger("[OBS] "));
    let obs_status = Arc::new(Mutex::new(ObsClientStatus::new()));

    spawn_task_obs_client(obs_logger.clone(), obs_config.clone(), obs_status.clone());

    let kicker = PublisherKicker::new(Arc::new(logger.make_child_logger("[KICK] ")), kick_config);

    let composer = Arc::new(ObsComposer::new(obs_logger, obs_config, obs_status, kicker));

    // Output prober

    let prober = Arc::new(HttpProber::new(Arc::new(
        logger.make_child_logger("[HEALTH:PROBE] "),
    )));

    // Start the arbiter

    let arbiter = ArbiterContext::start(&logger, arbiter_config, composer, prober).await;

    // Run hooks server

    let hooks_context = Arc::new(HooksContext {
        logger: Arc::new(logger.make_child_logger("[HOOKS] ")),
        config: hooks_config,
        controller: arbiter.controller,
        dispatcher_config: arbiter.dispatcher_config,
        health_threshold: arbiter.health_threshold,
    });

    let (end_notifier, mut end_receiver) = tokio::sync::mpsc::channel::<()>(1);

    hooks_server(
        Arc::new(logger.make_child_logger("[HOOKS:SERVER] ")),
        hooks_context,
        end_notifier,
    );

    _ = end_receiver.recv().await;

    // End of main

    Ok(())
}
