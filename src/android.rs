//! JNI bindings for Android.
//!
//! These functions are called from Kotlin via the JNI bridge.

use jni::objects::{JClass, JString};
use jni::sys::jstring;
use jni::JNIEnv;

use crate::generate_voicing_json;

/// Generate a voicing from a JSON request string.
///
/// Called from Kotlin as:
///   external fun generateVoicing(requestJson: String): String?
#[no_mangle]
pub extern "system" fn Java_com_chordcraft_app_VoiceLib_generateVoicing(
    mut env: JNIEnv,
    _class: JClass,
    request_json: JString,
) -> jstring {
    let request: String = match env.get_string(&request_json) {
        Ok(s) => s.into(),
        Err(_) => return std::ptr::null_mut(),
    };

    match generate_voicing_json(&request) {
        Ok(json) => match env.new_string(&json) {
            Ok(js) => js.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
        Err(_) => std::ptr::null_mut(),
    }
}
