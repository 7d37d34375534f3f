use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Identity profile of a voter, as stored in the database.
///
/// Profiles are reviewed and verified by an external process; this backend
/// only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCore {
    /// The user this profile belongs to.
    pub user: Id,
    /// Government-issued voter ID.
    pub voter_id: String,
    pub is_verified: bool,
    /// Base64 reference photo used for face verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_data: Option<String>,
}

/// A profile without an ID.
pub type NewProfile = ProfileCore;

/// A profile from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub profile: ProfileCore,
}

impl Deref for Profile {
    type Target = ProfileCore;

    fn deref(&self) -> &Self::Target {
        &self.profile
    }
}
