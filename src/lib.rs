//! voicelib — Roman-numeral harmony and voice-leading engine for ChordCraft Studio.
//!
//! Turns a key and an ordered list of Roman-numeral chord symbols into
//! playable per-voice note assignments (four-part SATB or melody with
//! stacked accompaniment), honoring voice ranges, spacing limits, doubling
//! rules, inversions, and a tunable melodic-smoothness preference.
//!
//! # Example
//! ```no_run
//! use voicelib::{generate_voicing, Style, VoicingRequest};
//!
//! let request = VoicingRequest {
//!     progression: vec!["I".into(), "IV".into(), "V7".into(), "I".into()],
//!     key: "C".into(),
//!     style: Style::Satb,
//!     num_voices: 3,
//!     smoothness: 5,
//!     meter: "4/4".into(),
//!     ranges: Default::default(),
//! };
//! let response = generate_voicing(&request).unwrap();
//! println!("{}", serde_json::to_string_pretty(&response).unwrap());
//! ```

pub mod chords;
pub mod engine;
pub mod error;
pub mod melody;
pub mod model;
pub mod resolver;
pub mod satb;
pub mod scorer;
pub mod theory;

#[cfg(target_os = "android")]
pub mod android;

pub use engine::{
    generate_steps, generate_voicing, generate_voicing_with, generate_with_ai_accompaniment,
    request_ai_accompaniment, AccompanimentProvider, EngineOptions,
};
pub use error::VoicelibError;
pub use model::*;
pub use scorer::{find_closest_note, ScoringWeights};
pub use theory::{fit_note_to_range, midi_to_name, parse_note_name, Key, Mode};

/// Generate a voicing from a JSON request string and return the response
/// as JSON. This is the entry point the host application calls across FFI.
pub fn generate_voicing_json(request_json: &str) -> Result<String, VoicelibError> {
    let request: VoicingRequest = serde_json::from_str(request_json)
        .map_err(|e| VoicelibError::invalid_input(format!("bad request JSON: {e}")))?;
    let response = generate_voicing(&request)?;
    serde_json::to_string(&response)
        .map_err(|e| VoicelibError::invalid_input(format!("JSON serialization error: {e}")))
}

// ═══════════════════════════════════════════════════════════════════════
// C FFI — for iOS (static library) and Android (JNI)
// ═══════════════════════════════════════════════════════════════════════

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Generate a voicing from a JSON request and return the response JSON as
/// a C string, or null on any error. The caller must free the returned
/// string with `voicelib_free_string`.
///
/// # Safety
/// `request` must be a valid null-terminated UTF-8 C string.
#[no_mangle]
pub unsafe extern "C" fn voicelib_generate_json(request: *const c_char) -> *mut c_char {
    if request.is_null() {
        return std::ptr::null_mut();
    }
    let c_str = unsafe { CStr::from_ptr(request) };
    let request_str = match c_str.to_str() {
        Ok(s) => s,
        Err(_) => return std::ptr::null_mut(),
    };

    match generate_voicing_json(request_str) {
        Ok(json) => CString::new(json).unwrap_or_default().into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Free a string previously returned by voicelib functions.
///
/// # Safety
/// `ptr` must be a string previously returned by a voicelib function, or null.
#[no_mangle]
pub unsafe extern "C" fn voicelib_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        unsafe {
            let _ = CString::from_raw(ptr);
        }
    }
}
