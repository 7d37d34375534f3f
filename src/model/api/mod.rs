//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as timestamps.
//!
//! Request bodies reject unknown fields.

pub mod auth;
pub mod context;
pub mod id;
pub mod vote;

pub use context::RequestContext;
pub use id::ApiId;
