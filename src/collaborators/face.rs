use std::sync::{Mutex, PoisonError};

use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::APP_USER_AGENT;

/// Result of comparing two face images.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceComparison {
    pub is_verified: bool,
    /// Percentage similarity, 0 to 100.
    pub similarity_score: f64,
}

/// Compares a captured face image with a reference image. Both are base64.
///
/// Acceptance thresholds are not the oracle's business.
#[rocket::async_trait]
pub trait FaceOracle: Send + Sync {
    async fn compare(&self, reference: &str, captured: &str) -> Result<FaceComparison>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompareRequest<'a> {
    reference_image: &'a str,
    captured_image: &'a str,
}

/// A face oracle behind an HTTP JSON endpoint.
pub struct HttpFaceOracle {
    client: Client,
    url: String,
}

impl HttpFaceOracle {
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .map_err(|e| Error::Collaborator(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[rocket::async_trait]
impl FaceOracle for HttpFaceOracle {
    async fn compare(&self, reference: &str, captured: &str) -> Result<FaceComparison> {
        let request = CompareRequest {
            reference_image: reference,
            captured_image: captured,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::Collaborator(format!("face oracle: {e}")))?;
        let comparison: FaceComparison = response
            .json()
            .await
            .map_err(|e| Error::Collaborator(format!("face oracle: {e}")))?;
        debug!("Face similarity {}", comparison.similarity_score);
        Ok(comparison)
    }
}

/// Scores every comparison the same. Used in tests.
#[derive(Debug)]
pub struct FixedFaceOracle {
    score: Mutex<f64>,
}

impl FixedFaceOracle {
    pub fn new(score: f64) -> Self {
        Self {
            score: Mutex::new(score),
        }
    }

    pub fn set_score(&self, score: f64) {
        *self.score.lock().unwrap_or_else(PoisonError::into_inner) = score;
    }
}

#[rocket::async_trait]
impl FaceOracle for FixedFaceOracle {
    async fn compare(&self, _reference: &str, _captured: &str) -> Result<FaceComparison> {
        let similarity_score = *self.score.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(FaceComparison {
            is_verified: similarity_score > 0.0,
            similarity_score,
        })
    }
}
