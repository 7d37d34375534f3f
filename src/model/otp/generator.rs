//! Time-windowed one-time codes.
//!
//! A code is the HMAC-SHA256 of the window counter `floor(unix_time / window)`
//! keyed by the user's MFA secret, dynamically truncated to six decimal digits
//! in the manner of RFC 4226. Every code in this backend is derived with the
//! same configured window, so issuing and checking can never disagree.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::code::Code;

type HmacSha256 = Hmac<Sha256>;

/// The index of the window containing `at`.
pub fn window_index(at: DateTime<Utc>, window: Duration) -> u64 {
    let seconds = at.timestamp().max(0) as u64;
    let window = window.num_seconds().max(1) as u64;
    seconds / window
}

/// Derive the code for `secret` in the window containing `at`.
pub fn generate(secret: &str, window: Duration, at: DateTime<Utc>) -> Code {
    let mut hmac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    hmac.update(&window_index(at, window).to_be_bytes());
    let digest = hmac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);
    Code::from_number(binary % 1_000_000)
}
