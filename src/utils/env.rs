// Environment variable utils

use std::{env, time::Duration};

/// Gets boolean env var
///
/// # Arguments
///
/// * `var_name` - The name of the environment variable
/// * `default_val` - The default value
///
/// # Return value
///
/// Returns true if the value of the variable is 'YES' or 'TRUE' (Case insensitive)
/// Returns false if the value of the variable is 'NO' or 'FALSE' (Case insensitive)
/// Otherwise, returns the value of default_val
pub fn get_env_bool(var_name: &str, default_val: bool) -> bool {
    match env::var(var_name) {
        Ok(var_str) => match var_str.to_uppercase().as_str() {
            "YES" | "TRUE" => true,
            "NO" | "FALSE" => false,
            _ => default_val,
        },
        Err(_) => default_val,
    }
}

/// Gets string env var
///
/// Returns the value of the variable or,
/// if not present, the value of default_val
pub fn get_env_string(var_name: &str, default_val: &str) -> String {
    match env::var(var_name) {
        Ok(r_var_str) => r_var_str,
        Err(_) => default_val.to_string(),
    }
}

/// Gets u32 env var
///
/// Returns the value of the variable as u32 or,
/// if not present or invalid, the value of default_val
pub fn get_env_u32(var_name: &str, default_val: u32) -> u32 {
    match env::var(var_name) {
        Ok(var_str) => var_str.trim().parse().unwrap_or(default_val),
        Err(_) => default_val,
    }
}

/// Gets u64 env var
///
/// Returns the value of the variable as u64 or,
/// if not present or invalid, the value of default_val
pub fn get_env_u64(var_name: &str, default_val: u64) -> u64 {
    match env::var(var_name) {
        Ok(var_str) => var_str.trim().parse().unwrap_or(default_val),
        Err(_) => default_val,
    }
}

/// Gets a duration env var, expressed in milliseconds
///
/// # Arguments
///
/// * `var_name` - The name of the environment variable
/// * `default_ms` - The default value, in milliseconds
pub fn get_env_millis(var_name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(get_env_u64(var_name, default_ms))
}
