// Stream key validation

use crate::utils::{get_env_bool, get_env_u32};

/// Default stream key length limit
pub const DEFAULT_MAX_KEY_LENGTH: usize = 128;

/// Stream key validation configuration
#[derive(Clone)]
pub struct KeyValidationConfig {
    /// Max length for keys
    pub max_len: usize,

    /// True to allow special characters in keys
    pub allow_special_characters: bool,
}

impl KeyValidationConfig {
    /// Loads configuration from environment variables
    pub fn load_from_env() -> KeyValidationConfig {
        let max_len = get_env_u32("KEY_MAX_LENGTH", DEFAULT_MAX_KEY_LENGTH as u32) as usize;
        let allow_special_characters = get_env_bool("KEY_ALLOW_SPECIAL_CHARACTERS", false);

        KeyValidationConfig {
            max_len,
            allow_special_characters,
        }
    }
}

impl Default for KeyValidationConfig {
    fn default() -> Self {
        KeyValidationConfig {
            max_len: DEFAULT_MAX_KEY_LENGTH,
            allow_special_characters: false,
        }
    }
}

/// Validates a stream key
///
/// Empty keys are never valid. The characters '>', '|' and line breaks
/// are always rejected, since keys end up inside kick commands
/// and source names.
///
/// # Return value
///
/// Returns true if the key is valid, false otherwise
pub fn validate_stream_key(key: &str, config: &KeyValidationConfig) -> bool {
    if key.is_empty() || key.len() > config.max_len {
        return false;
    }

    if config.allow_special_characters {
        return !key.chars().any(|c| matches!(c, '>' | '|' | '\n' | '\r'));
    }

    key.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_stream_key() {
        let mut config = KeyValidationConfig {
            max_len: 32,
            allow_special_characters: false,
        };

        assert!(!validate_stream_key("", &config));
        assert!(!validate_stream_key(
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
            &config
        ));
        assert!(!validate_stream_key("a%", &config));
        assert!(!validate_stream_key("key?token=1", &config));

        assert!(validate_stream_key("a", &config));
        assert!(validate_stream_key("abc-DEF-1234567890_", &config));

        // Allow special characters

        config.allow_special_characters = true;

        assert!(!validate_stream_key("", &config));
        assert!(validate_stream_key("a%", &config));
        assert!(validate_stream_key("user.name@host", &config));
        assert!(!validate_stream_key("kill>a", &config));
        assert!(!validate_stream_key("a|b", &config));
        assert!(!validate_stream_key("a\nb", &config));
    }
}
