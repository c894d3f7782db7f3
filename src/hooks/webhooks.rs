// Webhooks called by the ingest server

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::{log_debug, log_warning};

use super::{parse_stream_key, HooksContext};

/// Body of a hook request
#[derive(Deserialize, Debug)]
pub struct HookRequest {
    #[serde(default)]
    pub action: String,

    #[serde(default)]
    pub app: String,

    /// Stream name, possibly followed by the query string
    pub stream: String,
}

/// Forward targets
#[derive(Serialize, Debug)]
pub struct ForwardData {
    pub urls: Vec<String>,
}

/// Body of a hook response. Code 0 means accepted.
#[derive(Serialize, Debug)]
pub struct HookResponse {
    pub code: i32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ForwardData>,
}

impl HookResponse {
    fn accept() -> (StatusCode, Json<HookResponse>) {
        (StatusCode::OK, Json(HookResponse { code: 0, data: None }))
    }

    fn reject() -> (StatusCode, Json<HookResponse>) {
        (StatusCode::FORBIDDEN, Json(HookResponse { code: 1, data: None }))
    }
}

/// Handles on_publish
pub async fn on_publish_handler(
    State(context): State<Arc<HooksContext>>,
    Json(request): Json<HookRequest>,
) -> (StatusCode, Json<HookResponse>) {
    let key = match parse_stream_key(&request.stream, &context.config.key_validation) {
        Some(k) => k,
        None => {
            log_warning!(
                context.logger,
                format!("Rejected publish with invalid key: {:?}", request.stream)
            );
            return HookResponse::reject();
        }
    };

    log_debug!(
        context.logger,
        format!("{} {}/{}", request.action, request.app, key)
    );

    if context.controller.on_publish(&key).await.is_accepted() {
        HookResponse::accept()
    } else {
        HookResponse::reject()
    }
}

/// Handles on_unpublish
pub async fn on_unpublish_handler(
    State(context): State<Arc<HooksContext>>,
    Json(request): Json<HookRequest>,
) -> (StatusCode, Json<HookResponse>) {
    if let Some(key) = parse_stream_key(&request.stream, &context.config.key_validation) {
        context.controller.on_unpublish(&key).await;
    }

    HookResponse::accept()
}

/// Handles on_forward. Only the lead is forwarded, to its relay URL.
pub async fn on_forward_handler(
    State(context): State<Arc<HooksContext>>,
    Json(request): Json<HookRequest>,
) -> (StatusCode, Json<HookResponse>) {
    let mut urls = Vec::new();

    if let Some(key) = parse_stream_key(&request.stream, &context.config.key_validation) {
        if context.controller.on_forward(&key).await {
            urls.push(context.dispatcher_config.relay_url(&key));
        }
    }

    (
        StatusCode::OK,
        Json(HookResponse {
            code: 0,
            data: Some(ForwardData { urls }),
        }),
    )
}
