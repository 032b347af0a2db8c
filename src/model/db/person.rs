use serde::{Deserialize, Serialize};

/// A candidate, keyed on the candidacy feed's person ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "_id")]
    pub id: i64,
    pub name: String,
}

/// A registered party. Parties are maintained by a separate import and only
/// read during ballot synchronisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}
