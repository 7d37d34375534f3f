//! Opaque random credentials.

use data_encoding::HEXLOWER;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Bytes of entropy in session tokens, voting tokens and emailed links.
pub const TOKEN_BYTES: usize = 32;

/// Bytes of entropy in a per-user MFA secret.
pub const MFA_SECRET_BYTES: usize = 20;

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0_u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    HEXLOWER.encode(&bytes)
}

/// A fresh unguessable token, hex encoded.
pub fn random_token() -> String {
    random_hex(TOKEN_BYTES)
}

/// A fresh MFA secret, hex encoded.
pub fn random_mfa_secret() -> String {
    random_hex(MFA_SECRET_BYTES)
}

/// The form in which emailed tokens are stored: only the holder of the
/// original can present something that hashes to it.
pub fn digest_token(token: &str) -> String {
    HEXLOWER.encode(&Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_distinct() {
        let a = random_token();
        let b = random_token();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_sha256_hex() {
        assert_eq!(
            digest_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
