//! External collaborators the core calls out to: notification dispatch, face
//! comparison and vote attestation.
//!
//! Each is a trait with a production binding and a local one used by tests
//! and development setups. Every call is a single attempt.

mod face;
mod ledger;
mod notifier;

pub use face::{FaceComparison, FaceOracle, FixedFaceOracle, HttpFaceOracle};
pub use ledger::{AttestationLedger, DigestLedger, HttpLedger};
pub use notifier::{MemoryNotifier, Message, Notifier, SesNotifier};

use std::sync::Arc;

/// User agent sent with outgoing HTTP calls.
pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Every collaborator the backend uses, placed into managed state.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    /// Absent when no face oracle is configured; face checks are then skipped,
    /// or rejected outright under a mandatory face policy.
    pub faces: Option<Arc<dyn FaceOracle>>,
    pub ledger: Arc<dyn AttestationLedger>,
}
