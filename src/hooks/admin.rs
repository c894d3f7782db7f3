// Admin routes

use std::{sync::Arc, time::Duration};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{admission::EvictionReason, log_info, utils::string_compare_constant_time};

use super::HooksContext;

/// Status of the queue, for operators
#[derive(Serialize, Debug)]
pub struct QueueStatusResponse {
    pub lead: Option<String>,
    pub queue: Vec<String>,
    pub last_streamer: Option<String>,
    pub blocking_enabled: bool,
    pub revision: u64,
    pub min_delay_ms: u64,
    pub failure_threshold_ms: u64,
}

#[derive(Deserialize, Debug)]
pub struct BlockingRequest {
    pub enabled: bool,
}

#[derive(Deserialize, Debug)]
pub struct DurationRequest {
    pub millis: u64,
}

#[derive(Serialize, Debug)]
pub struct EvictResponse {
    pub evicted: bool,
}

/// Checks the bearer token of an admin request
fn check_admin(context: &HooksContext, headers: &HeaderMap) -> Result<(), StatusCode> {
    if context.config.admin_token.is_empty() {
        return Ok(());
    }

    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if !string_compare_constant_time(token.trim(), &context.config.admin_token) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(())
}

/// Gets the queue status
pub async fn get_queue_handler(
    State(context): State<Arc<HooksContext>>,
    headers: HeaderMap,
) -> Result<Json<QueueStatusResponse>, StatusCode> {
    check_admin(&context, &headers)?;

    let snapshot = context.controller.queue_status().await;

    Ok(Json(QueueStatusResponse {
        lead: snapshot.queue.first().cloned(),
        queue: snapshot.queue,
        last_streamer: snapshot.last_streamer,
        blocking_enabled: snapshot.blocking_enabled,
        revision: snapshot.revision,
        min_delay_ms: context.controller.jobs().min_delay().as_millis() as u64,
        failure_threshold_ms: context.health_threshold.get().as_millis() as u64,
    }))
}

/// Enables or disables blocking
pub async fn put_blocking_handler(
    State(context): State<Arc<HooksContext>>,
    headers: HeaderMap,
    Json(request): Json<BlockingRequest>,
) -> Result<StatusCode, StatusCode> {
    check_admin(&context, &headers)?;

    context.controller.set_blocking(request.enabled).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Changes the health failure threshold
pub async fn put_health_threshold_handler(
    State(context): State<Arc<HooksContext>>,
    headers: HeaderMap,
    Json(request): Json<DurationRequest>,
) -> Result<StatusCode, StatusCode> {
    check_admin(&context, &headers)?;

    if request.millis == 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    context
        .health_threshold
        .set(Duration::from_millis(request.millis));

    log_info!(
        context.logger,
        format!("Health failure threshold set to {} ms", request.millis)
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Changes the min delay between composer jobs
pub async fn put_dispatcher_delay_handler(
    State(context): State<Arc<HooksContext>>,
    headers: HeaderMap,
    Json(request): Json<DurationRequest>,
) -> Result<StatusCode, StatusCode> {
    check_admin(&context, &headers)?;

    context
        .controller
        .jobs()
        .set_min_delay(Duration::from_millis(request.millis));

    log_info!(
        context.logger,
        format!("Min delay between jobs set to {} ms", request.millis)
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Evicts the current lead
pub async fn post_evict_handler(
    State(context): State<Arc<HooksContext>>,
    headers: HeaderMap,
) -> Result<Json<EvictResponse>, StatusCode> {
    check_admin(&context, &headers)?;

    let evicted = context
        .controller
        .force_evict(EvictionReason::Operator)
        .await;

    Ok(Json(EvictResponse { evicted }))
}
