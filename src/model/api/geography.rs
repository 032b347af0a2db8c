//! Records from the electoral-geography registry.

use rocket::serde::json::Value;
use serde::Deserialize;

use super::null_as_default;
use crate::model::common::VotingSystem;

/// Group type of a registry record that groups a whole election together.
pub const ELECTION_GROUP: &str = "election";

/// Group type of a registry record for an election subtype.
pub const SUBTYPE_GROUP: &str = "subtype";

/// An election, subtype group or ballot as published by the geography registry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GeographyRecord {
    pub election_id: String,
    #[serde(default)]
    pub election_title: Option<String>,
    #[serde(default)]
    pub group_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<String>,
    #[serde(default)]
    pub current: Option<bool>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub requires_voter_id: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub voting_system: Option<VotingSystem>,
    #[serde(default)]
    pub organisation: Option<OrganisationRecord>,
    #[serde(default)]
    pub division: Option<DivisionRecord>,
    /// Ballot paper ID of the ballot replacing this one.
    #[serde(default)]
    pub replaced_by: Option<String>,
}

impl GeographyRecord {
    /// Is this a group record for a whole election, e.g. `local.2024-05-02`?
    pub fn is_election_group(&self) -> bool {
        self.group_type.as_deref() == Some(ELECTION_GROUP)
    }

    /// Is this a leaf ballot or a subtype group, whose metadata applies to a
    /// local ballot or election?
    pub fn is_leaf_or_subtype(&self) -> bool {
        matches!(self.group_type.as_deref(), None | Some(SUBTYPE_GROUP))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrganisationRecord {
    #[serde(default)]
    pub territory_code: Option<String>,
    #[serde(default)]
    pub organisation_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DivisionRecord {
    #[serde(default)]
    pub division_type: Option<String>,
}

/// Example data for tests.
#[cfg(test)]
pub(crate) mod examples {
    use rocket::serde::json::{serde_json::json, Value};

    use super::*;

    impl GeographyRecord {
        pub fn example_json(election_id: &str) -> Value {
            json!({
                "election_id": election_id,
                "election_title": "Example election (registry title)",
                "group_type": null,
                "children": [],
                "current": true,
                "metadata": null,
                "explanation": null,
                "requires_voter_id": "EA-2022",
                "cancellation_reason": null,
                "voting_system": {"slug": "FPTP", "name": "First-past-the-post"},
                "organisation": {"territory_code": "ENG", "organisation_type": "local-authority"},
                "division": {"division_type": "DIW"},
                "replaced_by": null,
            })
        }

        pub fn example_group_json(election_id: &str, children: &[&str]) -> Value {
            json!({
                "election_id": election_id,
                "election_title": "Example group",
                "group_type": ELECTION_GROUP,
                "children": children,
                "current": true,
            })
        }
    }
}
