use std::sync::Arc;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sesv2::{
    config::{Credentials, Region},
    Client as SesClient,
};
use chrono::Duration;
use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::collaborators::{
    AttestationLedger, Collaborators, DigestLedger, FaceOracle, HttpFaceOracle, HttpLedger,
    SesNotifier,
};
use crate::model::{
    memory::MemoryBackend,
    mongodb::{ensure_indexes_exist, stores as mongo_stores},
};

/// Whether a vote needs a matching face to go through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacePolicy {
    /// Compare faces when the voter has a reference photo and sends an image.
    #[default]
    Optional,
    /// Every vote must carry an image that matches the voter's reference photo.
    Required,
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // non-secrets
    public_url: String,
    mfa_ttl: u32,
    mfa_window: u32,
    voting_link_ttl: u32,
    auth_ttl: u32,
    verification_ttl: u32,
    reset_ttl: u32,
    #[serde(default)]
    face_policy: FacePolicy,
    face_similarity_threshold: f64,
    attestation_retry_interval: u32,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Base URL of the frontend. Emailed links point here.
    pub fn public_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }

    /// Valid lifetime of an MFA challenge in seconds.
    pub fn mfa_ttl(&self) -> Duration {
        Duration::seconds(self.mfa_ttl.into())
    }

    /// Length of the time window MFA codes are derived over, in seconds.
    pub fn mfa_window(&self) -> Duration {
        Duration::seconds(self.mfa_window.into())
    }

    /// Valid lifetime of a voting link in seconds.
    pub fn voting_link_ttl(&self) -> Duration {
        Duration::seconds(self.voting_link_ttl.into())
    }

    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Valid lifetime of an email verification link in seconds.
    pub fn verification_ttl(&self) -> Duration {
        Duration::seconds(self.verification_ttl.into())
    }

    /// Valid lifetime of a password reset link in seconds.
    pub fn reset_ttl(&self) -> Duration {
        Duration::seconds(self.reset_ttl.into())
    }

    pub fn face_policy(&self) -> FacePolicy {
        self.face_policy
    }

    /// Lowest face similarity score, in percent, that counts as a match.
    pub fn face_similarity_threshold(&self) -> f64 {
        self.face_similarity_threshold
    }

    /// How often votes the ledger missed are retried, in seconds.
    pub fn attestation_retry_interval(&self) -> Duration {
        Duration::seconds(self.attestation_retry_interval.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Where records and credentials live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Storage {
    #[default]
    Mongodb,
    /// Everything is lost on shutdown. Local development only.
    Memory,
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    #[serde(default)]
    storage: Storage,
    // secrets
    db_uri: Option<String>,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures the required indexes exist, and places the resulting `Stores`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        if config.storage == Storage::Memory {
            warn!("Using in-memory storage, nothing will survive a restart");
            rocket = rocket.manage(MemoryBackend::new().stores());
            return Ok(rocket);
        }

        let Some(db_uri) = config.db_uri else {
            error!("Failed to load database config: `db_uri` not set");
            return Err(rocket);
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(DATABASE_NAME);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(mongo_stores(&db));
        Ok(rocket)
    }
}

/// Name of the database to use.
const DATABASE_NAME: &str = "evote";

/// Configuration for the external collaborators.
#[derive(Deserialize)]
struct CollaboratorsConfig {
    // non-secrets
    aws_region: String,
    aws_access_key_id: String,
    /// Verified SES sender identity.
    ses_from_address: String,
    face_oracle_url: Option<String>,
    ledger_url: Option<String>,
    #[serde(default)]
    face_policy: FacePolicy,
    // secrets
    aws_secret_access_key: String,
}

/// A fairing that builds the notifier, face oracle and attestation ledger and
/// places them into managed state.
pub struct CollaboratorsFairing;

#[rocket::async_trait]
impl Fairing for CollaboratorsFairing {
    fn info(&self) -> Info {
        Info {
            name: "Collaborators",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<CollaboratorsConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load collaborator config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Notifications are emailed through SES.
        let aws_config = SdkConfig::builder()
            .region(Region::new(config.aws_region))
            .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                config.aws_access_key_id,
                config.aws_secret_access_key,
                None,
                None,
                "rocket config",
            )))
            .behavior_version(BehaviorVersion::latest())
            .build();
        let notifier = SesNotifier::new(SesClient::new(&aws_config), config.ses_from_address);
        info!("Loaded Amazon SES config");

        let faces: Option<Arc<dyn FaceOracle>> = match config.face_oracle_url {
            Some(url) => match HttpFaceOracle::new(url) {
                Ok(oracle) => Some(Arc::new(oracle)),
                Err(e) => {
                    error!("Failed to build face oracle client: {e}");
                    return Err(rocket);
                }
            },
            None if config.face_policy == FacePolicy::Required => {
                error!("`face_policy` is \"required\" but no `face_oracle_url` is set");
                return Err(rocket);
            }
            None => {
                warn!("No `face_oracle_url` set, face verification is disabled");
                None
            }
        };

        let ledger: Arc<dyn AttestationLedger> = match config.ledger_url {
            Some(url) => match HttpLedger::new(url) {
                Ok(ledger) => Arc::new(ledger),
                Err(e) => {
                    error!("Failed to build ledger client: {e}");
                    return Err(rocket);
                }
            },
            None => {
                info!("No `ledger_url` set, attesting votes locally");
                Arc::new(DigestLedger)
            }
        };

        // Manage the state.
        rocket = rocket.manage(Collaborators {
            notifier: Arc::new(notifier),
            faces,
            ledger,
        });
        Ok(rocket)
    }
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self {
                public_url: "http://localhost:5173".to_string(),
                mfa_ttl: 300,
                mfa_window: 120,
                voting_link_ttl: 120,
                auth_ttl: 86400,
                verification_ttl: 86400,
                reset_ttl: 600,
                face_policy: FacePolicy::Optional,
                face_similarity_threshold: 90.0,
                attestation_retry_interval: 300,
                jwt_secret: "test-jwt-secret".to_string(),
            }
        }

        pub fn with_face_policy(mut self, face_policy: FacePolicy) -> Self {
            self.face_policy = face_policy;
            self
        }
    }
}
