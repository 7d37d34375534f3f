use chrono::{serde::ts_seconds, DateTime, Utc};
use data_encoding::BASE64;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{api::ApiId, common::vote::Vote};

/// A request for a voting link for one election.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GenerateLinkRequest {
    pub election_id: ApiId,
}

/// Confirmation that a voting link is on its way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkIssued {
    pub message: String,
    /// Seconds until the link stops working.
    pub expires_in: i64,
}

/// A ballot, submitted through a voting link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CastVoteRequest {
    pub candidate_id: ApiId,
    /// Base64 photo of the voter, taken just now.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_image: Option<String>,
}

impl CastVoteRequest {
    pub fn validate(&self) -> Result<()> {
        if let Some(image) = &self.face_image {
            if image.is_empty() || BASE64.decode(image.as_bytes()).is_err() {
                return Err(Error::BadRequest(
                    "Face image must be base64 encoded".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A vote as shown back to the voter who cast it: no identity, location or
/// biometric data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVote {
    pub id: ApiId,
    pub election: ApiId,
    pub candidate: ApiId,
    #[serde(with = "ts_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
    pub is_anonymous: bool,
}

impl From<&Vote> for CastVote {
    fn from(vote: &Vote) -> Self {
        Self {
            id: vote.id.into(),
            election: vote.election.into(),
            candidate: vote.candidate.into(),
            timestamp: vote.timestamp,
            attestation: vote.attestation.clone(),
            is_anonymous: vote.is_anonymous,
        }
    }
}

/// Proof that the caller voted in an election, without saying how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub id: ApiId,
    pub election: ApiId,
    #[serde(with = "ts_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attestation: Option<String>,
}

impl From<&Vote> for VoteReceipt {
    fn from(vote: &Vote) -> Self {
        Self {
            id: vote.id.into(),
            election: vote.election.into(),
            timestamp: vote.timestamp,
            attestation: vote.attestation.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use crate::model::{
        common::vote::{FaceVerification, Location, VoteCore},
        mongodb::Id,
    };

    use super::*;

    fn vote() -> Vote {
        Vote {
            id: Id::new(),
            vote: VoteCore {
                election: Id::new(),
                voter: Id::new(),
                candidate: Id::new(),
                timestamp: Utc::now(),
                location: Location {
                    ip: Some("203.0.113.7".to_string()),
                },
                facial_verification: Some(FaceVerification {
                    is_verified: true,
                    similarity_score: 97.5,
                    verification_time: Utc::now(),
                }),
                attestation: Some("0xabc".to_string()),
                is_anonymous: true,
            },
        }
    }

    #[test]
    fn cast_vote_hides_voter_data() {
        let vote = vote();
        let json = serde_json::to_string(&CastVote::from(&vote)).unwrap();
        assert!(!json.contains(&vote.voter.to_string()));
        assert!(!json.contains("203.0.113.7"));
        assert!(!json.contains("similarity"));
        assert!(json.contains(&vote.candidate.to_string()));
    }

    #[test]
    fn receipt_hides_candidate() {
        let vote = vote();
        let json = serde_json::to_string(&VoteReceipt::from(&vote)).unwrap();
        assert!(!json.contains(&vote.candidate.to_string()));
        assert!(json.contains("0xabc"));
    }

    #[test]
    fn face_image_must_be_base64() {
        let mut request = CastVoteRequest {
            candidate_id: Id::new().into(),
            face_image: None,
        };
        assert!(request.validate().is_ok());
        request.face_image = Some("cmVmZXJlbmNlIHBob3Rv".to_string());
        assert!(request.validate().is_ok());
        request.face_image = Some("not base64!".to_string());
        assert!(request.validate().is_err());
        request.face_image = Some(String::new());
        assert!(request.validate().is_err());
    }
}
