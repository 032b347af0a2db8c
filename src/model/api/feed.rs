//! Records from the candidacy feed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::null_as_default;

/// One page of a cursor-paginated upstream listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// One ballot from the candidacy feed, with its election, post and nominees
/// embedded.
#[derive(Debug, Clone, Deserialize)]
pub struct BallotRecord {
    pub ballot_paper_id: String,
    pub election: ElectionRef,
    pub post: PostRef,
    #[serde(default)]
    pub winner_count: Option<u32>,
    #[serde(default)]
    pub cancelled: bool,
    #[serde(default)]
    pub candidates_locked: bool,
    #[serde(default)]
    pub uncontested: bool,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results: Option<ResultsRecord>,
    /// Ballot paper ID of a ballot this one replaces.
    #[serde(default)]
    pub replaces: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub candidacies: Vec<CandidacyRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElectionRef {
    pub election_id: String,
    pub name: String,
    pub election_date: NaiveDate,
    pub current: bool,
    #[serde(default)]
    pub party_lists_in_use: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub label: String,
}

impl PostRef {
    /// The upstream post ID, falling back to the slug for temporary ballots
    /// that don't have an ID yet. `None` if both are blank.
    pub fn key(&self) -> Option<&str> {
        [self.id.as_deref(), self.slug.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsRecord {
    #[serde(default)]
    pub num_turnout_reported: Option<u64>,
    #[serde(default)]
    pub total_electorate: Option<u64>,
    #[serde(default)]
    pub turnout_percentage: Option<f64>,
    #[serde(default)]
    pub num_spoilt_ballots: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidacyRecord {
    pub person: PersonRef,
    #[serde(default)]
    pub party: Option<PartyRef>,
    #[serde(default)]
    pub party_name: String,
    #[serde(default)]
    pub party_description_text: Option<String>,
    #[serde(default)]
    pub party_list_position: Option<i32>,
    #[serde(default)]
    pub deselected: bool,
    #[serde(default)]
    pub deselected_source: Option<String>,
    #[serde(default)]
    pub elected: Option<bool>,
    #[serde(default)]
    pub result: Option<CandidacyResult>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub previous_party_affiliations: Vec<PartyRef>,
}

impl CandidacyRecord {
    /// Elected flag, preferring the declared result over the candidacy's own flag.
    pub fn elected(&self) -> Option<bool> {
        self.result
            .as_ref()
            .and_then(|result| result.elected)
            .or(self.elected)
    }

    pub fn votes_cast(&self) -> Option<u64> {
        self.result.as_ref().and_then(|result| result.num_ballots)
    }

    pub fn party_id(&self) -> Option<&str> {
        self.party.as_ref().map(|party| party.legacy_slug.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonRef {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartyRef {
    pub legacy_slug: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CandidacyResult {
    #[serde(default)]
    pub elected: Option<bool>,
    #[serde(default)]
    pub num_ballots: Option<u64>,
}


/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use rocket::serde::json::{serde_json::json, Value};

    use super::*;

    impl BallotRecord {
        /// A ballot as it would appear in the feed, with two candidates.
        /// The election slug is derived from the first and last segments of the ID.
        pub fn example_json(ballot_paper_id: &str) -> Value {
            let segments: Vec<&str> = ballot_paper_id.split('.').collect();
            let election_type = segments[0];
            let date = segments[segments.len() - 1];
            let post_id = format!("post:{}", segments[1..segments.len() - 1].join("-"));
            json!({
                "ballot_paper_id": ballot_paper_id,
                "election": {
                    "election_id": format!("{election_type}.{date}"),
                    "name": "  Example election  ",
                    "election_date": date,
                    "current": true,
                    "party_lists_in_use": false,
                },
                "post": {"id": post_id, "slug": null, "label": "Example ward"},
                "winner_count": 1,
                "cancelled": false,
                "candidates_locked": true,
                "uncontested": false,
                "last_updated": "2024-06-10T12:00:00Z",
                "results": null,
                "replaces": null,
                "candidacies": [
                    {
                        "person": {"id": 101, "name": "Ada Lovelace"},
                        "party": {"legacy_slug": "party:52", "name": "Conservative and Unionist Party"},
                        "party_name": "Conservative and Unionist Party",
                        "party_description_text": null,
                        "party_list_position": null,
                        "deselected": false,
                        "deselected_source": null,
                        "elected": null,
                        "result": null,
                        "previous_party_affiliations": [
                            {"legacy_slug": "party:53"},
                            {"legacy_slug": "party:52"},
                            {"legacy_slug": "party:unknown"},
                        ],
                    },
                    {
                        "person": {"id": 102, "name": "Charles Babbage"},
                        "party": {"legacy_slug": "party:53", "name": "Labour Party"},
                        "party_name": "Labour Party",
                        "party_description_text": "Labour and Co-operative",
                        "party_list_position": null,
                        "deselected": false,
                        "deselected_source": null,
                        "elected": null,
                        "result": null,
                        "previous_party_affiliations": [],
                    },
                ],
            })
        }
    }
}
