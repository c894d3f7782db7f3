// Utility to compare secrets in constant time

/// Compares 2 strings without short-circuiting on the first mismatch,
/// so the admin token cannot be guessed byte by byte through timing
///
/// # Return value
///
/// Returns true if the 2 strings are equal, false otherwise
pub fn string_compare_constant_time(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_compare_constant_time() {
        assert!(string_compare_constant_time("secret-token", "secret-token"));
        assert!(string_compare_constant_time("", ""));

        assert!(!string_compare_constant_time("", "secret-token"));
        assert!(!string_compare_constant_time("secret-token", "secret-token2"));
        assert!(!string_compare_constant_time("secret-token", "secret-tokem"));
        assert!(!string_compare_constant_time("secret-token", "Secret-token"));
    }
}
