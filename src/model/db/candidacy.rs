use serde::{Deserialize, Serialize};

/// One person's nomination on one ballot.
///
/// Party name and description are copied at import time so that the
/// candidacy keeps displaying what was on the ballot paper even if the party
/// is later renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidacy {
    /// `{ballot_paper_id}/{person_id}`.
    #[serde(rename = "_id")]
    pub id: String,
    pub person_id: i64,
    pub ballot_paper_id: String,
    pub post_id: String,
    pub election_slug: String,
    pub party_id: Option<String>,
    pub party_name: String,
    pub party_description: Option<String>,
    pub list_position: Option<i32>,
    /// `None` until a result is known.
    pub elected: Option<bool>,
    pub votes_cast: Option<u64>,
    /// 1-based finishing position, derived from `votes_cast` across the ballot.
    pub rank: Option<u32>,
    pub deselected: bool,
    pub deselected_source: Option<String>,
    /// Parties this person previously stood for, other than `party_id`.
    pub previous_party_affiliations: Vec<String>,
}

impl Candidacy {
    pub fn id_for(ballot_paper_id: &str, person_id: i64) -> String {
        format!("{ballot_paper_id}/{person_id}")
    }
}
