use std::ops::{Deref, DerefMut};

use argon2::Config;
use mongodb::bson::DateTime as BsonDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{common::token::random_mfa_secret, mongodb::Id};

/// An argon2 hash of a password nobody has. Verified against when the email
/// is unknown, so that a login attempt costs the same either way.
const DUMMY_PASSWORD_HASH: &str =
    "$argon2i$v=19$m=4096,t=3,p=1$QW1mQXRkU2h5NGpMYW52dw$/8gyud7gTZlB1ythrBFhVCWTR374g27cO9A+Ri0t/bQ";

/// Core user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    pub email: String,
    pub password_hash: String,
    pub mfa_secret: String,
    pub is_verified: bool,
    /// Digest of the emailed verification token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_expire: Option<BsonDateTime>,
    /// Digest of the emailed password reset token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_expire: Option<BsonDateTime>,
}

impl UserCore {
    /// Create a new, unverified user with a fresh MFA secret.
    pub fn new(email: &str, password: &str) -> Result<Self> {
        Ok(Self {
            email: normalize_email(email),
            password_hash: hash_password(password)?,
            mfa_secret: random_mfa_secret(),
            is_verified: false,
            verification_token: None,
            verification_expire: None,
            reset_token: None,
            reset_expire: None,
        })
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // A malformed stored hash can never match anything.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }
}

/// Burn the same argon2 work as a real password check, and fail.
pub fn reject_unknown_user<T: AsRef<[u8]>>(password: T) -> bool {
    let _ = argon2::verify_encoded(DUMMY_PASSWORD_HASH, password.as_ref());
    false
}

/// Hash a plaintext password for storage.
pub fn hash_password(password: &str) -> Result<String> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    Ok(argon2::hash_encoded(
        password.as_bytes(),
        &salt,
        &Config::default(),
    )?)
}

/// Emails are unique case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use super::*;

    pub const EXAMPLE_EMAIL: &str = "ada@example.com";
    pub const EXAMPLE_PASSWORD: &str = "Correct-Horse-9";

    impl UserCore {
        pub fn example() -> Self {
            let mut user = Self::new(EXAMPLE_EMAIL, EXAMPLE_PASSWORD).unwrap();
            user.is_verified = true;
            user
        }

        pub fn example_unverified() -> Self {
            Self::new("grace@example.com", EXAMPLE_PASSWORD).unwrap()
        }
    }
}
