use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use log::{debug, error};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown email, wrong password, or unverified account.
    #[error("Invalid credentials")]
    Unauthenticated,
    /// MFA session, verification or reset token absent or expired.
    #[error("Invalid or expired MFA session")]
    InvalidOrExpiredToken,
    /// Voting token absent, expired, or already used.
    #[error("Invalid or expired voting link")]
    InvalidOrExpiredLink,
    #[error("Invalid MFA code")]
    InvalidCode,
    /// A voting token presented by someone other than the user it was issued to.
    #[error("Voting link belongs to another user")]
    Unauthorized,
    #[error("Election not found")]
    ElectionNotFound,
    #[error("Election is not currently active")]
    ElectionNotActive,
    #[error("Candidate not found in this election")]
    CandidateNotFound,
    #[error("Already voted in this election")]
    AlreadyVoted,
    #[error("Voter profile is not verified")]
    ProfileNotVerified,
    #[error("Face verification failed")]
    FaceVerificationFailed,
    #[error("Notification could not be sent: {0}")]
    DispatchFailed(String),
    /// A uniqueness constraint rejected a write.
    #[error("Record already exists")]
    StorageConflict,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("External service failed: {0}")]
    Collaborator(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status(&self) -> Status {
        match self {
            Self::Unauthenticated
            | Self::InvalidOrExpiredToken
            | Self::InvalidCode
            | Self::Unauthorized
            | Self::FaceVerificationFailed => Status::Unauthorized,
            Self::InvalidOrExpiredLink | Self::ElectionNotActive | Self::BadRequest(_) => {
                Status::BadRequest
            }
            Self::ElectionNotFound | Self::CandidateNotFound => Status::NotFound,
            Self::AlreadyVoted | Self::StorageConflict => Status::Conflict,
            Self::ProfileNotVerified => Status::Forbidden,
            Self::StoreUnavailable(_) => Status::ServiceUnavailable,
            Self::Collaborator(_) => Status::BadGateway,
            Self::DispatchFailed(_)
            | Self::Db(_)
            | Self::Jwt(_)
            | Self::Argon2(_)
            | Self::Internal(_) => Status::InternalServerError,
        }
    }

    /// The message shown to the client.
    ///
    /// Token and code failures all read the same, and infrastructure failures
    /// carry no detail at all.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidOrExpiredToken | Self::InvalidCode => "Invalid or expired token".to_string(),
            Self::DispatchFailed(_) => "Notification could not be sent".to_string(),
            Self::BadRequest(_) => self.to_string(),
            Self::StoreUnavailable(_) => "Service temporarily unavailable".to_string(),
            Self::Collaborator(_) => "Upstream service failed".to_string(),
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => debug!("{self}"),
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mfa_failures_are_indistinguishable() {
        let expired = Error::InvalidOrExpiredToken;
        let wrong = Error::InvalidCode;
        assert_eq!(expired.status(), wrong.status());
        assert_eq!(expired.public_message(), wrong.public_message());
    }

    #[test]
    fn infrastructure_errors_are_opaque() {
        let err = Error::Internal("voting grant for token abc is malformed".to_string());
        assert_eq!(err.status(), Status::InternalServerError);
        assert_eq!(err.public_message(), "Internal server error");

        let err = Error::Collaborator("connection refused to 10.0.0.7".to_string());
        assert!(!err.public_message().contains("10.0.0.7"));
    }

    #[test]
    fn conflicts_map_to_409() {
        assert_eq!(Error::AlreadyVoted.status(), Status::Conflict);
        assert_eq!(Error::StorageConflict.status(), Status::Conflict);
    }
}
