use serde::{Deserialize, Serialize};

use crate::model::common::DivisionType;

/// An electoral seat or division, independent of any particular date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Upstream seat identifier.
    #[serde(rename = "_id")]
    pub id: String,
    pub label: String,
    pub territory: Option<String>,
    pub organisation_type: Option<String>,
    pub division_type: Option<DivisionType>,
}

impl Post {
    pub fn new(id: String, label: String) -> Self {
        Self {
            id,
            label,
            territory: None,
            organisation_type: None,
            division_type: None,
        }
    }
}
