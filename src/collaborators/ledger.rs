use data_encoding::HEXLOWER;
use reqwest::Client;
use rocket::serde::json::serde_json;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::model::common::vote::VoteSummary;

use super::APP_USER_AGENT;

/// Records a tamper-evidence proof of a stored vote, returning an opaque
/// reference to it.
#[rocket::async_trait]
pub trait AttestationLedger: Send + Sync {
    async fn record(&self, summary: &VoteSummary) -> Result<String>;
}

#[derive(Deserialize)]
struct RecordResponse {
    reference: String,
}

/// A ledger behind an HTTP JSON endpoint.
pub struct HttpLedger {
    client: Client,
    url: String,
}

impl HttpLedger {
    pub fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .map_err(|e| Error::Collaborator(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[rocket::async_trait]
impl AttestationLedger for HttpLedger {
    async fn record(&self, summary: &VoteSummary) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(summary)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| Error::Collaborator(format!("ledger: {e}")))?;
        let body: RecordResponse = response
            .json()
            .await
            .map_err(|e| Error::Collaborator(format!("ledger: {e}")))?;
        Ok(body.reference)
    }
}

/// Attests a vote with a SHA-256 digest of its summary, without leaving the
/// process.
#[derive(Debug, Default)]
pub struct DigestLedger;

impl DigestLedger {
    pub fn digest(summary: &VoteSummary) -> Result<String> {
        let bytes = serde_json::to_vec(summary).map_err(|e| Error::Internal(e.to_string()))?;
        Ok(format!("0x{}", HEXLOWER.encode(&Sha256::digest(bytes))))
    }
}

#[rocket::async_trait]
impl AttestationLedger for DigestLedger {
    async fn record(&self, summary: &VoteSummary) -> Result<String> {
        Self::digest(summary)
    }
}
