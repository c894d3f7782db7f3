// Authentication against the OBS websocket server

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

/// Computes the authentication string for the Identify message
///
/// secret = base64(sha256(password + salt))
/// auth = base64(sha256(secret + challenge))
pub fn make_obs_auth_string(password: &str, salt: &str, challenge: &str) -> String {
    let secret = STANDARD.encode(Sha256::digest(format!("{}{}", password, salt).as_bytes()));

    STANDARD.encode(Sha256::digest(format!("{}{}", secret, challenge).as_bytes()))
}
