use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of electoral division a post covers, as published by the
/// geography registry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DivisionType {
    /// County electoral division.
    Ced,
    /// City of London ward.
    Cow,
    /// District ward.
    Diw,
    /// London borough ward.
    Lbw,
    /// Northern Irish council electoral area.
    Lge,
    /// Metropolitan district ward.
    Mtw,
    /// Northern Ireland Assembly constituency.
    Nie,
    /// Scottish Parliament constituency.
    Spc,
    /// Scottish Parliament region.
    Spe,
    /// Unitary authority electoral division.
    Ute,
    /// Unitary authority ward.
    Utw,
    /// Welsh Assembly constituency.
    Wac,
    /// Welsh Assembly region.
    Wae,
    /// Westminster constituency.
    Wmc,
}

const ALL: [DivisionType; 14] = [
    DivisionType::Ced,
    DivisionType::Cow,
    DivisionType::Diw,
    DivisionType::Lbw,
    DivisionType::Lge,
    DivisionType::Mtw,
    DivisionType::Nie,
    DivisionType::Spc,
    DivisionType::Spe,
    DivisionType::Ute,
    DivisionType::Utw,
    DivisionType::Wac,
    DivisionType::Wae,
    DivisionType::Wmc,
];

impl DivisionType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ced => "CED",
            Self::Cow => "COW",
            Self::Diw => "DIW",
            Self::Lbw => "LBW",
            Self::Lge => "LGE",
            Self::Mtw => "MTW",
            Self::Nie => "NIE",
            Self::Spc => "SPC",
            Self::Spe => "SPE",
            Self::Ute => "UTE",
            Self::Utw => "UTW",
            Self::Wac => "WAC",
            Self::Wae => "WAE",
            Self::Wmc => "WMC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid division type {0:?}")]
pub struct InvalidDivisionType(pub String);

impl FromStr for DivisionType {
    type Err = InvalidDivisionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL.into_iter()
            .find(|division| division.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| InvalidDivisionType(s.to_string()))
    }
}

impl TryFrom<String> for DivisionType {
    type Error = InvalidDivisionType;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DivisionType> for String {
    fn from(division: DivisionType) -> Self {
        division.code().to_string()
    }
}

impl Display for DivisionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
