//! Domain types shared by the API, the services and the stores.
//!
//! These are serialised in a DB-friendly way (IDs and datetimes in MongoDB's
//! own format); anything that goes out over the API is converted into the
//! types in [`crate::model::api`] first.

pub mod audit;
pub mod election;
pub mod profile;
pub mod token;
pub mod user;
pub mod vote;
