// URL templates bound to a stream key

/// Placeholder replaced by the stream key
pub const KEY_PLACEHOLDER: &str = "{key}";

/// Renders a template, replacing every {key} placeholder
///
/// If the template has no placeholder, the key is appended
/// as the last path segment
pub fn render_key_template(template: &str, key: &str) -> String {
    if template.contains(KEY_PLACEHOLDER) {
        return template.replace(KEY_PLACEHOLDER, key);
    }

    if template.ends_with('/') {
        format!("{}{}", template, key)
    } else {
        format!("{}/{}", template, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_key_template() {
        assert_eq!(
            render_key_template("rtmp://127.0.0.1:1935/relay/{key}", "abc"),
            "rtmp://127.0.0.1:1935/relay/abc"
        );
        assert_eq!(
            render_key_template("kill-session>{key}", "abc"),
            "kill-session>abc"
        );
        assert_eq!(
            render_key_template("rtmp://relay/live", "abc"),
            "rtmp://relay/live/abc"
        );
        assert_eq!(
            render_key_template("rtmp://relay/live/", "abc"),
            "rtmp://relay/live/abc"
        );
    }
}
