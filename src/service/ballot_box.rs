use chrono::Utc;
use log::{debug, error, info, warn};
use mongodb::bson::doc;
use rocket::serde::json::serde_json;

use crate::collaborators::Collaborators;
use crate::config::{Config, FacePolicy};
use crate::error::{Error, Result};
use crate::model::{
    api::{
        vote::{CastVote, CastVoteRequest},
        RequestContext,
    },
    common::{
        audit::AuditAction,
        vote::{FaceVerification, Location, NewVote},
    },
    credentials::{voting_token_key, VotingGrant},
    mongodb::Id,
    store::Stores,
};

use super::{Attestor, Auditor};

/// Turns voting tokens into votes.
pub struct BallotBox<'a> {
    config: &'a Config,
    stores: &'a Stores,
    collaborators: &'a Collaborators,
}

impl<'a> BallotBox<'a> {
    pub fn new(config: &'a Config, stores: &'a Stores, collaborators: &'a Collaborators) -> Self {
        Self {
            config,
            stores,
            collaborators,
        }
    }

    /// Cast `caller`'s vote using a voting token.
    ///
    /// The token is used up as soon as it is found, whatever happens next.
    pub async fn cast(
        &self,
        token: &str,
        caller: Id,
        request: &CastVoteRequest,
        context: &RequestContext,
    ) -> Result<CastVote> {
        self.stores.credentials.ping().await?;

        let grant = self
            .stores
            .credentials
            .take(&voting_token_key(token))
            .await?
            .ok_or(Error::InvalidOrExpiredLink)?;
        let grant: VotingGrant = serde_json::from_str(&grant)
            .map_err(|e| Error::Internal(format!("malformed voting grant: {e}")))?;
        if *grant.user_id != caller {
            warn!("User {caller} presented a voting token issued to {}", grant.user_id);
            return Err(Error::Unauthorized);
        }

        let election = self
            .stores
            .elections
            .by_id(*grant.election_id)
            .await?
            .ok_or(Error::ElectionNotFound)?;
        let now = Utc::now();
        if !election.is_active_at(now) {
            return Err(Error::ElectionNotActive);
        }
        let candidate = election
            .candidate(*request.candidate_id)
            .ok_or(Error::CandidateNotFound)?;
        if self.stores.votes.exists(election.id, caller).await? {
            return Err(Error::AlreadyVoted);
        }

        let facial_verification = self
            .verify_face(caller, request.face_image.as_deref())
            .await?;

        let vote = NewVote {
            election: election.id,
            voter: caller,
            candidate: candidate.id,
            timestamp: now,
            location: Location {
                ip: context.ip_address.clone(),
            },
            facial_verification,
            attestation: None,
            is_anonymous: true,
        };
        // A concurrent cast can slip past the check above; the store cannot.
        let mut vote = match self.stores.votes.insert(vote).await {
            Ok(vote) => vote,
            Err(Error::StorageConflict) => return Err(Error::AlreadyVoted),
            Err(e) => return Err(e),
        };
        info!("Recorded vote {} in election {}", vote.id, election.id);

        // The vote stands whether or not it can be attested.
        let attestor = Attestor::new(
            self.stores.votes.as_ref(),
            self.collaborators.ledger.as_ref(),
        );
        if let Err(e) = attestor.attest(&mut vote).await {
            error!("Failed to attest vote {}, leaving it for the backfill: {e}", vote.id);
        }

        Auditor::new(self.stores.audit.as_ref())
            .record(
                AuditAction::VoteCast,
                caller,
                context,
                doc! { "election": election.id, "candidate": candidate.id },
            )
            .await;

        Ok(CastVote::from(&vote))
    }

    /// Compare the submitted image with the voter's reference photo, as far
    /// as the face policy demands.
    async fn verify_face(
        &self,
        voter: Id,
        image: Option<&str>,
    ) -> Result<Option<FaceVerification>> {
        let required = self.config.face_policy() == FacePolicy::Required;
        let reference = self
            .stores
            .profiles
            .by_user(voter)
            .await?
            .and_then(|profile| profile.profile.face_data);

        let (reference, image) = match (reference, image) {
            (Some(reference), Some(image)) => (reference, image),
            _ if required => {
                debug!("Missing reference photo or image for voter {voter}");
                return Err(Error::FaceVerificationFailed);
            }
            _ => return Ok(None),
        };
        let Some(oracle) = &self.collaborators.faces else {
            if required {
                return Err(Error::FaceVerificationFailed);
            }
            warn!("No face oracle configured, skipping face verification");
            return Ok(None);
        };

        let comparison = oracle.compare(&reference, image).await?;
        let threshold = self.config.face_similarity_threshold();
        if comparison.similarity_score < threshold {
            info!(
                "Face similarity {} below {threshold} for voter {voter}",
                comparison.similarity_score
            );
            return Err(Error::FaceVerificationFailed);
        }
        Ok(Some(FaceVerification {
            is_verified: true,
            similarity_score: comparison.similarity_score,
            verification_time: Utc::now(),
        }))
    }
}
