use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Weight used for election types we have no table for.
const UNKNOWN_TYPE_WEIGHT: i32 = 30;

/// The kind of election, derived from the first dot-segment of an election
/// slug or ballot paper ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElectionType {
    /// Referendum.
    Ref,
    /// UK Parliament.
    Parl,
    /// European Parliament.
    Europarl,
    /// Directly elected mayor.
    Mayor,
    /// Northern Ireland Assembly.
    Nia,
    /// Greater London Assembly.
    Gla,
    /// National Assembly for Wales (pre-2021).
    Naw,
    /// Senedd Cymru.
    Senedd,
    /// Scottish Parliament.
    Sp,
    /// Police and Crime Commissioner.
    Pcc,
    /// Local authority.
    Local,
    /// Anything else. Keeps the raw prefix so it round-trips.
    Other(String),
}

impl ElectionType {
    /// Derive the election type from an election slug or ballot paper ID.
    pub fn from_id(id: &str) -> Self {
        id.split('.').next().unwrap_or_default().into()
    }

    /// The raw prefix as used in IDs.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Ref => "ref",
            Self::Parl => "parl",
            Self::Europarl => "europarl",
            Self::Mayor => "mayor",
            Self::Nia => "nia",
            Self::Gla => "gla",
            Self::Naw => "naw",
            Self::Senedd => "senedd",
            Self::Sp => "sp",
            Self::Pcc => "pcc",
            Self::Local => "local",
            Self::Other(prefix) => prefix,
        }
    }

    /// Default charisma for this election type.
    pub fn default_weight(&self) -> i32 {
        match self {
            Self::Ref => 100,
            Self::Parl => 90,
            Self::Europarl => 80,
            Self::Mayor | Self::Pcc => 70,
            Self::Nia | Self::Gla | Self::Naw | Self::Senedd | Self::Sp => 60,
            Self::Local => 40,
            Self::Other(_) => UNKNOWN_TYPE_WEIGHT,
        }
    }

    /// Weights for organisation types and subtypes that differ from the default.
    fn weight_overrides(&self) -> &'static [(&'static str, i32)] {
        match self {
            Self::Mayor => &[("local-authority", 65)],
            Self::Gla => &[("a", 55)],
            Self::Naw => &[("r", 55)],
            Self::Senedd => &[("r", 65), ("c", 60)],
            Self::Sp => &[("r", 55)],
            _ => &[],
        }
    }

    /// Look up an organisation type or subtype in this type's table.
    fn weight_for(&self, key: &str) -> Option<i32> {
        self.weight_overrides()
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, weight)| *weight)
    }
}

impl From<&str> for ElectionType {
    fn from(prefix: &str) -> Self {
        match prefix {
            "ref" => Self::Ref,
            "parl" => Self::Parl,
            "europarl" => Self::Europarl,
            "mayor" => Self::Mayor,
            "nia" => Self::Nia,
            "gla" => Self::Gla,
            "naw" => Self::Naw,
            "senedd" => Self::Senedd,
            "sp" => Self::Sp,
            "pcc" => Self::Pcc,
            "local" => Self::Local,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ElectionType {
    fn from(prefix: String) -> Self {
        prefix.as_str().into()
    }
}

impl From<ElectionType> for String {
    fn from(election_type: ElectionType) -> Self {
        election_type.as_str().to_string()
    }
}

impl FromStr for ElectionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl Display for ElectionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compute the display weight ("charisma") of a ballot from its paper ID.
/// Higher weights are shown first among contests on the same date.
///
/// This is only ever used for ordering, never for identity.
pub fn ballot_weight(ballot_paper_id: &str) -> i32 {
    let mut segments = ballot_paper_id.split('.');
    let election_type = ElectionType::from(segments.next().unwrap_or_default());
    let second = segments.next();

    // An organisation type or subtype in second position may carry its own weight.
    let mut weight = second
        .and_then(|segment| election_type.weight_for(segment))
        .unwrap_or_else(|| election_type.default_weight());

    // Regional/additional member subtypes.
    if let Some(subtype @ ("r" | "a")) = second {
        if let Some(subtype_weight) = election_type.weight_for(subtype) {
            weight = subtype_weight;
        }
    }

    // By-elections sort just below scheduled elections of the same type.
    if ballot_paper_id.contains(".by.") {
        weight -= 1;
    }

    weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_from_id() {
        assert_eq!(ElectionType::from_id("parl.2024-07-04"), ElectionType::Parl);
        assert_eq!(
            ElectionType::from_id("local.stroud.2024-05-02"),
            ElectionType::Local
        );
        assert_eq!(
            ElectionType::from_id("wibble.2024-05-02"),
            ElectionType::Other("wibble".to_string())
        );
        assert_eq!(ElectionType::from_id("wibble").as_str(), "wibble");
    }

    #[test]
    fn parliament_outranks_local() {
        assert!(ballot_weight("parl.2024-07-04") > ballot_weight("local.foo.2024-07-04"));
        assert_eq!(ballot_weight("parl.2024-07-04"), 90);
        assert_eq!(ballot_weight("local.foo.2024-07-04"), 40);
    }

    #[test]
    fn by_elections_sort_just_below() {
        assert_eq!(
            ballot_weight("parl.by.2024-07-04"),
            ballot_weight("parl.2024-07-04") - 1
        );
        assert_eq!(
            ballot_weight("local.stroud.central.by.2024-05-02"),
            ballot_weight("local.stroud.central.2024-05-02") - 1
        );
    }

    #[test]
    fn subtypes_override_default() {
        assert_eq!(ballot_weight("gla.c.barnet-and-camden.2024-05-02"), 60);
        assert_eq!(ballot_weight("gla.a.2024-05-02"), 55);
        assert_eq!(ballot_weight("sp.r.glasgow.2021-05-06"), 55);
        assert_eq!(ballot_weight("senedd.r.south-wales-west.2021-05-06"), 65);
        // `c` isn't a regional/additional marker but is still in the table.
        assert_eq!(ballot_weight("senedd.c.gower.2021-05-06"), 60);
        // Subtype not in this type's table falls back to the default.
        assert_eq!(ballot_weight("parl.r.2024-07-04"), 90);
    }

    #[test]
    fn organisation_type_overrides_default() {
        assert_eq!(ballot_weight("mayor.london.2024-05-02"), 70);
        assert_eq!(ballot_weight("mayor.local-authority.2024-05-02"), 65);
    }

    #[test]
    fn unknown_types() {
        assert_eq!(ballot_weight("wibble.2024-05-02"), 30);
        assert_eq!(ballot_weight("wibble.by.2024-05-02"), 29);
        assert_eq!(ballot_weight(""), 30);
    }

    #[test]
    fn serde_as_string() {
        let json = rocket::serde::json::serde_json::to_string(&ElectionType::Sp).unwrap();
        assert_eq!(json, "\"sp\"");
        let parsed: ElectionType =
            rocket::serde::json::serde_json::from_str("\"nope\"").unwrap();
        assert_eq!(parsed, ElectionType::Other("nope".to_string()));
    }
}
