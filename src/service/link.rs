use chrono::{Duration, Utc};
use log::{info, warn};
use mongodb::bson::doc;
use rocket::serde::json::serde_json;

use crate::collaborators::Notifier;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{vote::LinkIssued, RequestContext},
    common::{audit::AuditAction, token::random_token, user::User},
    credentials::{voting_token_key, VotingGrant},
    mongodb::Id,
    store::Stores,
};

use super::Auditor;

pub const LINK_SUBJECT: &str = "Your Voting Link - Online Voting System";

/// Issues single-use voting links to eligible voters.
pub struct VotingLinks<'a> {
    config: &'a Config,
    stores: &'a Stores,
    notifier: &'a dyn Notifier,
}

impl<'a> VotingLinks<'a> {
    pub fn new(config: &'a Config, stores: &'a Stores, notifier: &'a dyn Notifier) -> Self {
        Self {
            config,
            stores,
            notifier,
        }
    }

    /// Email the user a link they can vote in the given election with, once.
    pub async fn issue(
        &self,
        user: &User,
        election_id: Id,
        context: &RequestContext,
    ) -> Result<LinkIssued> {
        self.stores.credentials.ping().await?;

        let election = self
            .stores
            .elections
            .by_id(election_id)
            .await?
            .ok_or(Error::ElectionNotFound)?;
        if !election.is_active_at(Utc::now()) {
            return Err(Error::ElectionNotActive);
        }
        if self.stores.votes.exists(election.id, user.id).await? {
            return Err(Error::AlreadyVoted);
        }
        let verified = self
            .stores
            .profiles
            .by_user(user.id)
            .await?
            .map_or(false, |profile| profile.is_verified);
        if !verified {
            return Err(Error::ProfileNotVerified);
        }

        let token = random_token();
        let key = voting_token_key(&token);
        let grant = VotingGrant {
            user_id: user.id.into(),
            election_id: election.id.into(),
        };
        let grant = serde_json::to_string(&grant).map_err(|e| Error::Internal(e.to_string()))?;
        let ttl = self.config.voting_link_ttl();
        self.stores.credentials.put(&key, &grant, ttl).await?;

        let link = format!("{}/vote/{token}", self.config.public_url());
        let message = format!(
            "Please use the following link to cast your vote. This link will expire in {}: {link}",
            describe(ttl)
        );
        if let Err(e) = self.notifier.send(&user.email, LINK_SUBJECT, &message).await {
            warn!("Failed to send voting link to user {}: {e}", user.id);
            // Nobody received it, so nobody may use it.
            if let Err(e) = self.stores.credentials.delete(&key).await {
                warn!("Failed to discard undelivered voting token: {e}");
            }
            return Err(match e {
                Error::DispatchFailed(_) => e,
                other => Error::DispatchFailed(other.to_string()),
            });
        }

        Auditor::new(self.stores.audit.as_ref())
            .record(
                AuditAction::VotingLinkGenerated,
                user.id,
                context,
                doc! { "election": election.id },
            )
            .await;

        info!("Issued voting link for election {} to user {}", election.id, user.id);
        Ok(LinkIssued {
            message: "Voting link sent to your email".to_string(),
            expires_in: ttl.num_seconds(),
        })
    }
}

/// A lifetime in words, exact to the second.
fn describe(ttl: Duration) -> String {
    fn unit(count: i64, name: &str) -> String {
        if count == 1 {
            format!("1 {name}")
        } else {
            format!("{count} {name}s")
        }
    }

    let seconds = ttl.num_seconds();
    match (seconds / 60, seconds % 60) {
        (0, seconds) => unit(seconds, "second"),
        (minutes, 0) => unit(minutes, "minute"),
        (minutes, seconds) => format!("{} {}", unit(minutes, "minute"), unit(seconds, "second")),
    }
}
