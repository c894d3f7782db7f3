// OBS websocket messages (protocol v5)

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

pub const OBS_RPC_VERSION: u32 = 1;

pub const OP_HELLO: u8 = 0;
pub const OP_IDENTIFY: u8 = 1;
pub const OP_IDENTIFIED: u8 = 2;
pub const OP_EVENT: u8 = 5;
pub const OP_REQUEST: u8 = 6;
pub const OP_REQUEST_RESPONSE: u8 = 7;

/// Message envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObsMessage {
    /// Operation code
    pub op: u8,

    /// Data
    pub d: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObsAuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsHello {
    #[serde(default)]
    pub obs_web_socket_version: String,
    pub rpc_version: u32,
    pub authentication: Option<ObsAuthChallenge>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsIdentify {
    pub rpc_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<String>,
    pub event_subscriptions: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsRequest {
    pub request_type: String,
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObsRequestStatus {
    pub result: bool,
    pub code: u16,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObsRequestResponse {
    pub request_type: String,
    pub request_id: String,
    pub request_status: ObsRequestStatus,
    #[serde(default)]
    pub response_data: Option<Value>,
}

impl ObsMessage {
    /// Creates a message from its data
    pub fn new<T: Serialize>(op: u8, data: &T) -> ObsMessage {
        ObsMessage {
            op,
            d: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }

    /// Creates a request message
    pub fn request(request_type: &str, request_id: u64, request_data: Option<Value>) -> ObsMessage {
        ObsMessage::new(
            OP_REQUEST,
            &ObsRequest {
                request_type: request_type.to_string(),
                request_id: request_id.to_string(),
                request_data,
            },
        )
    }

    /// Parses a message from string
    pub fn parse(input: &str) -> Option<ObsMessage> {
        serde_json::from_str(input).ok()
    }

    /// Serializes the message
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decodes the data of the message
    pub fn data<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.d.clone()).ok()
    }
}
