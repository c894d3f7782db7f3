// Hooks server configuration

use crate::{
    log::Logger,
    log_error, log_warning,
    utils::{get_env_string, get_env_u32, KeyValidationConfig},
};

/// Hooks server configuration
#[derive(Clone)]
pub struct HooksServerConfiguration {
    /// Port
    pub port: u32,

    /// Bind address
    pub bind_address: String,

    /// Bearer token for the admin routes. Empty means no authentication.
    pub admin_token: String,

    /// Stream key validation
    pub key_validation: KeyValidationConfig,
}

impl HooksServerConfiguration {
    pub fn load_from_env(logger: &Logger) -> Result<HooksServerConfiguration, ()> {
        let port = get_env_u32("HOOKS_PORT", 8085);

        if port == 0 || port > 65535 {
            log_error!(logger, format!("HOOKS_PORT has an invalid value: {}", port));
            return Err(());
        }

        let bind_address = get_env_string("HOOKS_BIND_ADDRESS", "");

        let admin_token = get_env_string("ADMIN_TOKEN", "");

        if admin_token.is_empty() {
            log_warning!(
                logger,
                "ADMIN_TOKEN is empty. Anyone reaching the hooks server can manage the queue."
            );
        }

        Ok(HooksServerConfiguration {
            port,
            bind_address,
            admin_token,
            key_validation: KeyValidationConfig::load_from_env(),
        })
    }

    /// Gets the address for listening
    pub fn get_tcp_listen_addr(&self) -> String {
        let bind_address = if self.bind_address.is_empty() {
            "0.0.0.0"
        } else {
            self.bind_address.as_str()
        };

        format!("{}:{}", bind_address, self.port)
    }
}
