// Media input status

/// Playback state of an input, as reported by the composer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStatus {
    /// Nothing loaded yet
    None,

    /// Opening the URL
    Opening,

    /// Receiving data, not rendering yet
    Buffering,

    /// Rendering frames
    Playing,

    /// Paused
    Paused,

    /// Stopped
    Stopped,

    /// The media ended
    Ended,

    /// The input failed to open or decode
    Error,
}

impl InputStatus {
    /// Parses the media state string reported by OBS
    pub fn from_obs_media_state(state: &str) -> InputStatus {
        match state {
            "OBS_MEDIA_STATE_OPENING" => InputStatus::Opening,
            "OBS_MEDIA_STATE_BUFFERING" => InputStatus::Buffering,
            "OBS_MEDIA_STATE_PLAYING" => InputStatus::Playing,
            "OBS_MEDIA_STATE_PAUSED" => InputStatus::Paused,
            "OBS_MEDIA_STATE_STOPPED" => InputStatus::Stopped,
            "OBS_MEDIA_STATE_ENDED" => InputStatus::Ended,
            "OBS_MEDIA_STATE_ERROR" => InputStatus::Error,
            _ => InputStatus::None,
        }
    }

    /// True if the input will never reach the playing state by itself
    pub fn is_terminal_failure(&self) -> bool {
        matches!(self, InputStatus::Ended | InputStatus::Error)
    }
}
