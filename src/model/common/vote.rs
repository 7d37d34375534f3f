use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Where a vote was cast from, as far as we can tell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// Outcome of comparing the voter's live photo with their reference photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceVerification {
    pub is_verified: bool,
    pub similarity_score: f64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub verification_time: DateTime<Utc>,
}

/// Core vote data, as stored in the database.
///
/// The pair `(election, voter)` is unique at the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteCore {
    pub election: Id,
    pub voter: Id,
    pub candidate: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facial_verification: Option<FaceVerification>,
    /// Opaque reference into the attestation ledger, attached once recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
    pub is_anonymous: bool,
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

impl DerefMut for Vote {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.vote
    }
}

/// The subset of a vote that leaves the building for attestation. Carries no
/// voter identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSummary {
    pub vote_id: String,
    pub election_id: String,
    pub candidate_id: String,
    pub timestamp: i64,
}

impl From<&Vote> for VoteSummary {
    fn from(vote: &Vote) -> Self {
        Self {
            vote_id: vote.id.to_string(),
            election_id: vote.election.to_string(),
            candidate_id: vote.candidate.to_string(),
            timestamp: vote.timestamp.timestamp_millis(),
        }
    }
}
