use chrono::NaiveDate;
use rocket::serde::json::Value;
use serde::{Deserialize, Serialize};

use crate::model::common::{ElectionType, VotingSystem};

/// A group of ballots sharing a date and type, e.g. a general election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Election {
    /// Globally unique slug, e.g. `parl.2024-07-04`. Never changes once created.
    #[serde(rename = "_id")]
    pub slug: String,
    pub name: String,
    pub date: NaiveDate,
    pub current: bool,
    pub election_type: ElectionType,
    /// Ordering tie-break, recomputed on every import.
    pub weight: i32,
    pub uses_lists: bool,
    pub description: Option<String>,
    pub requires_voter_id: Option<String>,
    pub cancellation_reason: Option<String>,
    pub voting_system: Option<VotingSystem>,
    pub metadata: Option<Value>,
}

impl Election {
    /// Create a bare election with nothing but the registry fields set.
    pub fn new(slug: String, name: String, date: NaiveDate, current: bool) -> Self {
        let election_type = ElectionType::from_id(&slug);
        Self {
            slug,
            name,
            date,
            current,
            election_type,
            weight: 0,
            uses_lists: false,
            description: None,
            requires_voter_id: None,
            cancellation_reason: None,
            voting_system: None,
            metadata: None,
        }
    }

    /// Is polling day strictly before `today`?
    pub fn in_past(&self, today: NaiveDate) -> bool {
        self.date < today
    }
}
