// JWT generation for kick requests

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::{log::Logger, log_error};

use super::HttpKickConfiguration;

const JWT_EXPIRATION_TIME_SECONDS: i64 = 120;

#[derive(Debug, Serialize, Deserialize)]
pub struct KickJwtClaims {
    /// Issued at (UTC timestamp)
    pub iat: i64,

    /// Expiration (UTC timestamp)
    pub exp: i64,

    /// Subject
    pub sub: String,

    /// Event
    pub event: String,

    /// Stream key of the publisher to kick
    pub key: String,
}

/// Generates the JWT sent along a kick request
pub fn make_kick_jwt(logger: &Logger, config: &HttpKickConfiguration, key: &str) -> String {
    let now = Utc::now().timestamp();

    let claims = KickJwtClaims {
        iat: now,
        exp: now + JWT_EXPIRATION_TIME_SECONDS,
        sub: config.jwt_subject.clone(),
        event: "kick".to_string(),
        key: key.to_string(),
    };

    let header = Header::new(Algorithm::HS256);
    match encode(
        &header,
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    ) {
        Ok(token) => token,
        Err(e) => {
            log_error!(logger, format!("Error encoding JWT: {}", e));
            "".to_string()
        }
    }
}
