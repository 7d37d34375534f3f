//! The identity-verification and vote-casting core.
//!
//! Services borrow their configuration, stores and collaborators from managed
//! state for the length of one request.

pub mod account;
pub mod attestation;
pub mod audit;
pub mod ballot_box;
pub mod link;
pub mod mfa;

pub use account::Accounts;
pub use attestation::{AttestationBackfillFairing, Attestor};
pub use audit::Auditor;
pub use ballot_box::BallotBox;
pub use link::VotingLinks;
pub use mfa::MfaSessions;
