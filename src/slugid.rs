// src/slugid.rs

//! Fresh task identifiers.
//!
//! Identifiers are 22-character URL-safe base64 encodings of a v4 UUID with
//! the most significant bit cleared, so they never start with `-`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use uuid::Uuid;

/// Generate a new identifier.
pub fn slugid() -> String {
    let mut bytes = Uuid::new_v4().into_bytes();
    bytes[0] &= 0x7f;
    URL_SAFE_NO_PAD.encode(bytes)
}
