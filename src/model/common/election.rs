use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A candidate standing in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: Id,
    pub name: String,
}

/// Core election data, as stored in the database.
///
/// Elections are created and managed elsewhere; this backend only reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_date: DateTime<Utc>,
    pub candidates: Vec<Candidate>,
}

impl ElectionCore {
    /// Is voting open at the given instant? Both ends of the window are inclusive.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.start_date <= at && at <= self.end_date
    }

    /// Look up one of this election's candidates.
    pub fn candidate(&self, id: Id) -> Option<&Candidate> {
        self.candidates.iter().find(|candidate| candidate.id == id)
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use chrono::{Duration, TimeZone};

    use super::*;

    impl ElectionCore {
        /// An election open from yesterday until tomorrow.
        pub fn example() -> Self {
            let now = Utc::now();
            Self::example_between(now - Duration::days(1), now + Duration::days(1))
        }

        /// An election that ran over the first day of 2025.
        pub fn example_finished() -> Self {
            Self::example_between(
                Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
            )
        }

        pub fn example_between(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
            Self {
                title: "Student union president".to_string(),
                start_date,
                end_date,
                candidates: vec![
                    Candidate {
                        id: Id::new(),
                        name: "Amara Okafor".to_string(),
                    },
                    Candidate {
                        id: Id::new(),
                        name: "Tomas Lindqvist".to_string(),
                    },
                ],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn window_is_inclusive() {
        let election = ElectionCore::example_finished();
        assert!(election.is_active_at(election.start_date));
        assert!(election.is_active_at(election.end_date));
        assert!(!election.is_active_at(election.end_date + Duration::seconds(1)));
        assert!(!election.is_active_at(Utc.with_ymd_and_hms(2025, 1, 3, 0, 0, 0).unwrap()));
    }

    #[test]
    fn candidate_lookup() {
        let election = ElectionCore::example();
        let first = election.candidates[0].id;
        assert_eq!(election.candidate(first).unwrap().name, "Amara Okafor");
        assert!(election.candidate(Id::new()).is_none());
    }
}
