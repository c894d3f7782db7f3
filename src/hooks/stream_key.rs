// Stream key extraction

use crate::utils::{validate_stream_key, KeyValidationConfig};

/// Extracts the stream key from the `stream` field of a hook.
/// Some ingest servers append the publish query string to it.
///
/// # Return value
///
/// Returns the key, or None if it is not valid
pub fn parse_stream_key(stream: &str, config: &KeyValidationConfig) -> Option<String> {
    let key = match stream.split_once('?') {
        Some((k, _)) => k,
        None => stream,
    }
    .trim();

    if !validate_stream_key(key, config) {
        return None;
    }

    Some(key.to_string())
}
