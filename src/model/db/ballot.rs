use mongodb::bson::DateTime;
use rocket::serde::json::Value;
use serde::{Deserialize, Serialize};

use crate::model::common::VotingSystem;

/// One concrete contest for one post on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    /// Globally unique ballot paper ID; the merge key for imports.
    #[serde(rename = "_id")]
    pub ballot_paper_id: String,
    pub election_slug: String,
    pub post_id: String,
    /// Seats being contested.
    pub winner_count: u32,
    pub cancelled: bool,
    /// The candidate list has been finalised upstream.
    pub locked: bool,
    pub contested: bool,
    /// The ballot that replaced this one, if it was cancelled and re-run.
    pub replaced_by: Option<String>,
    pub metadata: Option<Value>,
    pub voting_system: Option<VotingSystem>,
    pub requires_voter_id: Option<String>,
    pub cancellation_reason: Option<String>,
    #[serde(flatten)]
    pub results: BallotResults,
    /// Last modification time reported by the candidacy feed.
    pub upstream_modified: Option<DateTime>,
}

/// Turnout figures, present once results are declared.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotResults {
    pub ballot_papers_issued: Option<u64>,
    pub electorate: Option<u64>,
    pub turnout: Option<f64>,
    pub spoilt_ballots: Option<u64>,
}

impl Ballot {
    pub fn new(ballot_paper_id: String, election_slug: String, post_id: String) -> Self {
        Self {
            ballot_paper_id,
            election_slug,
            post_id,
            winner_count: 1,
            cancelled: false,
            locked: false,
            contested: true,
            replaced_by: None,
            metadata: None,
            voting_system: None,
            requires_voter_id: None,
            cancellation_reason: None,
            results: BallotResults::default(),
            upstream_modified: None,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Ballot {
        pub fn example(ballot_paper_id: &str, election_slug: &str, post_id: &str) -> Self {
            Self::new(
                ballot_paper_id.to_string(),
                election_slug.to_string(),
                post_id.to_string(),
            )
        }
    }
}
