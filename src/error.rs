//! Error taxonomy surfaced to callers.
//!
//! Two failure families matter to the host application: input it can fix
//! (`InvalidInput`) and progressions that cannot be realized at all
//! (`MusicTheory`). Soft voicing failures are never errors — they come back
//! as `None` pitches so a single bad chord cannot abort a whole progression.

use thiserror::Error;

/// Errors produced by the harmony and voicing pipeline.
#[derive(Debug, Error)]
pub enum VoicelibError {
    /// Caller-supplied input is structurally unrecognizable: unknown key
    /// name, malformed pitch range (`min > max`), bad request JSON.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An internal harmonic-resolution step produced an invalid or empty
    /// chord: bad Roman numeral, scale-degree overflow, zero playable notes.
    #[error("music theory error: {0}")]
    MusicTheory(String),

    /// The external accompaniment provider failed, or returned text that is
    /// not the expected JSON note list.
    #[error("accompaniment provider error: {0}")]
    Provider(String),
}

impl VoicelibError {
    /// Shorthand for an `InvalidInput` with a formatted message.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        VoicelibError::InvalidInput(msg.into())
    }

    /// Shorthand for a `MusicTheory` with a formatted message.
    pub fn theory(msg: impl Into<String>) -> Self {
        VoicelibError::MusicTheory(msg.into())
    }
}
