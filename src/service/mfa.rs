use chrono::Utc;
use log::{debug, info, warn};
use subtle::ConstantTimeEq;

use crate::collaborators::Notifier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::auth::AuthToken,
    common::{
        token::random_token,
        user::{normalize_email, reject_unknown_user, User},
    },
    credentials::{mfa_attempts_key, mfa_code_key, mfa_session_key},
    mongodb::Id,
    otp::{generator, Code},
    store::Stores,
};

pub const MFA_SUBJECT: &str = "Your MFA Verification Code";

/// Code submissions allowed per user within one MFA TTL, right or wrong.
/// Past this the challenge is discarded.
pub const MAX_MFA_ATTEMPTS: u32 = 5;

/// Two-step login: password first, then a one-time code sent to the user.
pub struct MfaSessions<'a> {
    config: &'a Config,
    stores: &'a Stores,
    notifier: &'a dyn Notifier,
}

impl<'a> MfaSessions<'a> {
    pub fn new(config: &'a Config, stores: &'a Stores, notifier: &'a dyn Notifier) -> Self {
        Self {
            config,
            stores,
            notifier,
        }
    }

    /// Check a user's password and, if correct, send them a code.
    ///
    /// Returns the MFA session token to present alongside the code.
    pub async fn login(&self, email: &str, password: &str) -> Result<String> {
        self.stores.credentials.ping().await?;

        // Unknown emails cost the same argon2 work as known ones.
        let user = self.stores.users.by_email(&normalize_email(email)).await?;
        let authenticated = match &user {
            Some(user) => user.verify_password(password) && user.is_verified,
            None => reject_unknown_user(password),
        };
        let user = match user {
            Some(user) if authenticated => user,
            _ => {
                debug!("Rejected login attempt");
                return Err(Error::Unauthenticated);
            }
        };

        let session = random_token();
        let code = generator::generate(&user.mfa_secret, self.config.mfa_window(), Utc::now());
        self.store_challenge(&session, user.id, code).await?;

        let message = format!("Your MFA verification code is: {code}");
        if let Err(e) = self.notifier.send(&user.email, MFA_SUBJECT, &message).await {
            warn!("Failed to send MFA code to user {}: {e}", user.id);
            self.discard_challenge(&session, user.id).await;
            return Err(match e {
                Error::DispatchFailed(_) => e,
                other => Error::DispatchFailed(other.to_string()),
            });
        }

        info!("Issued MFA challenge to user {}", user.id);
        Ok(session)
    }

    /// Check a submitted code against an MFA session. On success the session
    /// is used up and a signed session credential is returned.
    pub async fn verify(&self, session: &str, code: &str) -> Result<(User, String)> {
        let credentials = &self.stores.credentials;
        credentials.ping().await?;

        let session_key = mfa_session_key(session);
        let user_id: Id = credentials
            .get(&session_key)
            .await?
            .ok_or(Error::InvalidOrExpiredToken)?
            .parse()
            .map_err(|_| Error::Internal("malformed MFA session entry".to_string()))?;
        let code_key = mfa_code_key(user_id);
        let expected: Code = credentials
            .get(&code_key)
            .await?
            .ok_or(Error::InvalidOrExpiredToken)?
            .parse()
            .map_err(|_| Error::Internal("malformed MFA code entry".to_string()))?;

        let attempts_key = mfa_attempts_key(user_id);
        let attempts = credentials
            .increment(&attempts_key, self.config.mfa_ttl())
            .await?;
        if attempts > MAX_MFA_ATTEMPTS {
            warn!("Too many MFA attempts for user {user_id}, discarding challenge");
            self.discard_challenge(session, user_id).await;
            return Err(Error::InvalidCode);
        }

        // A malformed submission is just a wrong one. The entries stay so the
        // user can try again until they expire or run out of attempts.
        let matches = match code.trim().parse::<Code>() {
            Ok(submitted) => bool::from(submitted.ct_eq(&expected)),
            Err(_) => false,
        };
        if !matches {
            debug!("Wrong MFA code for user {user_id} (attempt {attempts})");
            return Err(Error::InvalidCode);
        }

        // Of any concurrent verifications, only the one that takes the
        // session gets through.
        credentials
            .take(&session_key)
            .await?
            .ok_or(Error::InvalidOrExpiredToken)?;
        credentials.delete(&code_key).await?;
        credentials.delete(&attempts_key).await?;

        let user = self
            .stores
            .users
            .by_id(user_id)
            .await?
            .ok_or(Error::Unauthenticated)?;
        let jwt = AuthToken::new(&user).encode(self.config)?;
        info!("User {user_id} completed MFA");
        Ok((user, jwt))
    }

    async fn store_challenge(&self, session: &str, user: Id, code: Code) -> Result<()> {
        let credentials = &self.stores.credentials;
        let ttl = self.config.mfa_ttl();
        credentials
            .put(&mfa_session_key(session), &user.to_string(), ttl)
            .await?;
        if let Err(e) = credentials
            .put(&mfa_code_key(user), &code.to_string(), ttl)
            .await
        {
            self.discard_challenge(session, user).await;
            return Err(e);
        }
        Ok(())
    }

    /// Best effort: anything left behind expires with its TTL anyway.
    async fn discard_challenge(&self, session: &str, user: Id) {
        let credentials = &self.stores.credentials;
        for key in [mfa_session_key(session), mfa_code_key(user)] {
            if let Err(e) = credentials.delete(&key).await {
                warn!("Failed to discard MFA challenge entry: {e}");
            }
        }
    }
}
