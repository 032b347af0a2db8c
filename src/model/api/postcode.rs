//! Responses from the postcode lookup service, and the resolved view we
//! return to callers.

use rocket::serde::json::Value;
use serde::{Deserialize, Serialize};

use super::null_as_default;
use crate::model::api::ballot::BallotSummary;

/// Raw lookup response, either an address picker or a list of polling dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostcodeResponse {
    #[serde(default)]
    pub address_picker: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub addresses: Vec<Address>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dates: Vec<PollingDate>,
    #[serde(default)]
    pub electoral_services: Option<Value>,
    #[serde(default)]
    pub registration: Option<Value>,
}

impl PostcodeResponse {
    /// Ballot paper IDs in the order the lookup service listed them.
    pub fn ballot_paper_ids(&self) -> Vec<String> {
        self.dates
            .iter()
            .flat_map(|date| date.ballots.iter())
            .map(|ballot| ballot.ballot_paper_id.clone())
            .collect()
    }
}

/// One address sharing a postcode, for disambiguation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Unique property reference, used for the address-level lookup.
    pub slug: String,
    pub address: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// The contests and polling arrangements for one polling day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingDate {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ballots: Vec<BallotRef>,
    #[serde(default)]
    pub polling_station: Option<Value>,
    #[serde(default)]
    pub postal_vote: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotRef {
    pub ballot_paper_id: String,
}

/// The result of resolving a postcode, as served to the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PostcodeView {
    /// The postcode covers addresses in different areas; the caller must pick one.
    AddressPicker { postcode: String, addresses: Vec<Address> },
    /// Ballots for the postcode (or address), in display order.
    Ballots {
        postcode: String,
        ballots: Vec<BallotSummary>,
        polling_station: Option<Value>,
        postal_vote: Option<Value>,
        electoral_services: Option<Value>,
        registration: Option<Value>,
    },
    /// The lookup service failed for a reason other than bad input; the page
    /// renders without ballot information.
    Unavailable { postcode: String },
}
