use chrono::Utc;
use log::{info, warn};
use mongodb::bson::DateTime as BsonDateTime;

use crate::collaborators::Notifier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::auth::{RegisterRequest, ResetPasswordRequest},
    common::{
        token::{digest_token, random_token},
        user::{hash_password, normalize_email, NewUser, User},
    },
    store::Stores,
};

pub const VERIFICATION_SUBJECT: &str = "Email Verification - Online Voting System";
pub const RESET_SUBJECT: &str = "Password Reset Request";

/// Account lifecycle: registration, email verification and password resets.
///
/// Emailed tokens are only ever stored as digests.
pub struct Accounts<'a> {
    config: &'a Config,
    stores: &'a Stores,
    notifier: &'a dyn Notifier,
}

impl<'a> Accounts<'a> {
    pub fn new(config: &'a Config, stores: &'a Stores, notifier: &'a dyn Notifier) -> Self {
        Self {
            config,
            stores,
            notifier,
        }
    }

    /// Create an unverified account and email its verification link.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        let token = random_token();
        let mut new_user = NewUser::new(&request.email, &request.password)?;
        new_user.verification_token = Some(digest_token(&token));
        new_user.verification_expire = Some(BsonDateTime::from_chrono(
            Utc::now() + self.config.verification_ttl(),
        ));
        let user = self.stores.users.insert(new_user).await?;

        let link = format!("{}/verify/{token}", self.config.public_url());
        let message =
            format!("Please verify your email by clicking on the following link: {link}");
        if let Err(e) = self
            .notifier
            .send(&user.email, VERIFICATION_SUBJECT, &message)
            .await
        {
            warn!("Failed to send verification email to user {}: {e}", user.id);
            if let Err(e) = self.stores.users.clear_verification_token(user.id).await {
                warn!("Failed to clear undelivered verification token: {e}");
            }
            return Err(match e {
                Error::DispatchFailed(_) => e,
                other => Error::DispatchFailed(other.to_string()),
            });
        }

        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Mark the owner of an emailed verification token as verified.
    pub async fn verify_email(&self, token: &str) -> Result<User> {
        let user = self
            .stores
            .users
            .consume_verification_token(&digest_token(token), Utc::now())
            .await?
            .ok_or(Error::InvalidOrExpiredToken)?;
        info!("Verified email of user {}", user.id);
        Ok(user)
    }

    /// Email a password reset link, if the email belongs to anyone.
    ///
    /// Succeeds either way, so it cannot be used to discover accounts.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let Some(user) = self.stores.users.by_email(&normalize_email(email)).await? else {
            info!("Password reset requested for an unknown email");
            return Ok(());
        };

        let token = random_token();
        let expire_at = Utc::now() + self.config.reset_ttl();
        self.stores
            .users
            .set_reset_token(user.id, &digest_token(&token), expire_at)
            .await?;

        let link = format!("{}/reset-password/{token}", self.config.public_url());
        let message = format!(
            "You are receiving this email because you (or someone else) has requested a password reset. Please make a PUT request to: \n\n {link}"
        );
        if let Err(e) = self.notifier.send(&user.email, RESET_SUBJECT, &message).await {
            warn!("Failed to send password reset email to user {}: {e}", user.id);
            if let Err(e) = self.stores.users.clear_reset_token(user.id).await {
                warn!("Failed to clear undelivered reset token: {e}");
            }
        }
        Ok(())
    }

    /// Set a new password using an emailed reset token.
    pub async fn reset_password(&self, token: &str, request: &ResetPasswordRequest) -> Result<()> {
        let password_hash = hash_password(&request.password)?;
        let consumed = self
            .stores
            .users
            .consume_reset_token(&digest_token(token), &password_hash, Utc::now())
            .await?;
        if !consumed {
            return Err(Error::InvalidOrExpiredToken);
        }
        info!("Password reset completed");
        Ok(())
    }
}
