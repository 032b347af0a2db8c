//! Types shared between the upstream feed, database and API representations.

mod division;
mod election_type;

pub use division::{DivisionType, InvalidDivisionType};
pub use election_type::{ballot_weight, ElectionType};

use serde::{Deserialize, Serialize};

/// A voting system, e.g. `FPTP` or `AMS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VotingSystem {
    pub slug: String,
    #[serde(default)]
    pub name: String,
}

impl VotingSystem {
    /// Does this system present candidates as party lists?
    pub fn uses_party_lists(&self) -> bool {
        matches!(self.slug.as_str(), "PR-CL" | "AMS")
    }
}
