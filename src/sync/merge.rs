//! Rules for merging geography registry data into local records.
//!
//! Nothing here does I/O: callers fetch the registry record and persist the
//! result.

use rocket::serde::json::Value;

use crate::model::{
    api::geography::GeographyRecord,
    common::{DivisionType, InvalidDivisionType, VotingSystem},
    db::{Ballot, Election, Post},
};
use crate::sync::options::ImportOptions;

/// Territory recorded for posts the registry has no organisation for.
pub const UNKNOWN_TERRITORY: &str = "-";

/// A local field that may or may not hold a value yet.
pub trait Field {
    fn is_set(&self) -> bool;
}

impl Field for Option<String> {
    fn is_set(&self) -> bool {
        self.as_deref().map_or(false, |s| !s.trim().is_empty())
    }
}

impl Field for Option<Value> {
    fn is_set(&self) -> bool {
        matches!(self, Some(value) if !value.is_null())
    }
}

impl Field for Option<VotingSystem> {
    fn is_set(&self) -> bool {
        self.is_some()
    }
}

impl Field for Option<DivisionType> {
    fn is_set(&self) -> bool {
        self.is_some()
    }
}

/// Enrichment fills unset fields, and replaces set ones only when forced.
pub fn should_overwrite<F: Field>(current: &F, forced: bool) -> bool {
    forced || !current.is_set()
}

/// Which enriched fields may be replaced even though they hold a value.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Overwrite {
    /// Every enriched field.
    pub all: bool,
    /// The metadata blob.
    pub metadata: bool,
}

impl From<&ImportOptions> for Overwrite {
    fn from(options: &ImportOptions) -> Self {
        Self {
            all: options.force_update,
            metadata: options.force_update || options.force_current_metadata,
        }
    }
}

/// Copy registry data onto a ballot and its post.
///
/// An invalid division type is an upstream data problem and is returned as
/// an error; the caller decides how loudly to fail.
pub fn enrich_ballot(
    ballot: &mut Ballot,
    post: &mut Post,
    record: Option<&GeographyRecord>,
    overwrite: Overwrite,
) -> Result<(), InvalidDivisionType> {
    let organisation = record.and_then(|record| record.organisation.as_ref());

    if should_overwrite(&post.territory, overwrite.all) {
        let territory = organisation
            .and_then(|org| org.territory_code.clone())
            .unwrap_or_else(|| UNKNOWN_TERRITORY.to_string());
        post.territory = Some(territory);
    }

    let record = match record {
        Some(record) => record,
        None => return Ok(()),
    };

    if should_overwrite(&ballot.voting_system, overwrite.all) && record.voting_system.is_some() {
        ballot.voting_system = record.voting_system.clone();
    }
    if should_overwrite(&ballot.metadata, overwrite.metadata) {
        ballot.metadata = record.metadata.clone();
    }
    if should_overwrite(&ballot.requires_voter_id, overwrite.all) {
        ballot.requires_voter_id = record.requires_voter_id.clone();
    }
    if should_overwrite(&ballot.cancellation_reason, overwrite.all) {
        ballot.cancellation_reason = record.cancellation_reason.clone();
    }
    if should_overwrite(&post.organisation_type, overwrite.all) {
        if let Some(org) = organisation {
            post.organisation_type = org.organisation_type.clone();
        }
    }
    if should_overwrite(&post.division_type, overwrite.all) {
        if let Some(division) = &record.division {
            post.division_type = division
                .division_type
                .as_deref()
                .filter(|code| !code.is_empty())
                .map(str::parse::<DivisionType>)
                .transpose()?;
        }
    }
    Ok(())
}

/// Copy registry data onto an election. Only non-empty registry values are
/// used, so a field the registry leaves blank keeps its local value.
///
/// Returns true if anything changed.
pub fn enrich_election(election: &mut Election, record: &GeographyRecord) -> bool {
    let before = election.clone();
    let non_empty = |value: &Option<String>| value.clone().filter(|s| !s.trim().is_empty());

    if let Some(title) = non_empty(&record.election_title) {
        election.name = title;
    }
    if record.metadata.is_set() {
        election.metadata = record.metadata.clone();
    }
    if let Some(description) = non_empty(&record.explanation) {
        election.description = Some(description);
    }
    if let Some(requires_voter_id) = non_empty(&record.requires_voter_id) {
        election.requires_voter_id = Some(requires_voter_id);
    }
    if let Some(reason) = non_empty(&record.cancellation_reason) {
        election.cancellation_reason = Some(reason);
    }
    if let Some(voting_system) = &record.voting_system {
        election.voting_system = Some(voting_system.clone());
    }

    *election != before
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::{serde_json, serde_json::json};

    use super::*;

    fn record(id: &str) -> GeographyRecord {
        serde_json::from_value(GeographyRecord::example_json(id)).unwrap()
    }

    fn ballot_and_post() -> (Ballot, Post) {
        (
            Ballot::example("local.stroud.central.2024-05-02", "local.2024-05-02", "central"),
            Post::new("central".to_string(), "Central".to_string()),
        )
    }

    #[test]
    fn overwrite_strategy() {
        let unset: Option<String> = None;
        let blank = Some("  ".to_string());
        let set = Some("EA-2022".to_string());
        assert!(should_overwrite(&unset, false));
        assert!(should_overwrite(&blank, false));
        assert!(!should_overwrite(&set, false));
        assert!(should_overwrite(&set, true));

        assert!(should_overwrite(&Some(Value::Null), false));
        assert!(!should_overwrite(&Some(json!({"a": 1})), false));
    }

    #[test]
    fn enrichment_fills_unset_fields() {
        let (mut ballot, mut post) = ballot_and_post();
        let record = record(&ballot.ballot_paper_id);
        enrich_ballot(&mut ballot, &mut post, Some(&record), Overwrite::default()).unwrap();

        assert_eq!(post.territory.as_deref(), Some("ENG"));
        assert_eq!(post.organisation_type.as_deref(), Some("local-authority"));
        assert_eq!(post.division_type, Some(DivisionType::Diw));
        assert_eq!(ballot.requires_voter_id.as_deref(), Some("EA-2022"));
        assert_eq!(ballot.voting_system.as_ref().map(|v| v.slug.as_str()), Some("FPTP"));
    }

    #[test]
    fn enrichment_keeps_set_fields_unless_forced() {
        let (mut ballot, mut post) = ballot_and_post();
        ballot.requires_voter_id = Some("pilot-2019".to_string());
        post.territory = Some("WLS".to_string());
        let record = record(&ballot.ballot_paper_id);

        enrich_ballot(&mut ballot, &mut post, Some(&record), Overwrite::default()).unwrap();
        assert_eq!(ballot.requires_voter_id.as_deref(), Some("pilot-2019"));
        assert_eq!(post.territory.as_deref(), Some("WLS"));

        let forced = Overwrite {
            all: true,
            metadata: true,
        };
        enrich_ballot(&mut ballot, &mut post, Some(&record), forced).unwrap();
        assert_eq!(ballot.requires_voter_id.as_deref(), Some("EA-2022"));
        assert_eq!(post.territory.as_deref(), Some("ENG"));
    }

    #[test]
    fn metadata_has_its_own_force_flag() {
        let (mut ballot, mut post) = ballot_and_post();
        ballot.metadata = Some(json!({"old": true}));
        let mut record = record(&ballot.ballot_paper_id);
        record.metadata = Some(json!({"new": true}));

        enrich_ballot(&mut ballot, &mut post, Some(&record), Overwrite::default()).unwrap();
        assert_eq!(ballot.metadata, Some(json!({"old": true})));

        let options = ImportOptions {
            force_current_metadata: true,
            ..Default::default()
        };
        enrich_ballot(&mut ballot, &mut post, Some(&record), (&options).into()).unwrap();
        assert_eq!(ballot.metadata, Some(json!({"new": true})));
    }

    #[test]
    fn missing_record_sets_unknown_territory_only() {
        let (mut ballot, mut post) = ballot_and_post();
        let untouched = ballot.clone();
        enrich_ballot(&mut ballot, &mut post, None, Overwrite::default()).unwrap();
        assert_eq!(post.territory.as_deref(), Some(UNKNOWN_TERRITORY));
        assert_eq!(ballot, untouched);
    }

    #[test]
    fn invalid_division_type_is_an_error() {
        let (mut ballot, mut post) = ballot_and_post();
        let mut record = record(&ballot.ballot_paper_id);
        record.division = Some(crate::model::api::geography::DivisionRecord {
            division_type: Some("NOPE".to_string()),
        });
        let err = enrich_ballot(&mut ballot, &mut post, Some(&record), Overwrite::default())
            .unwrap_err();
        assert_eq!(err, InvalidDivisionType("NOPE".to_string()));
    }

    #[test]
    fn election_enrichment_never_clobbers_with_blanks() {
        let mut election = Election::example_parl();
        election.description = Some("Existing description".to_string());
        election.requires_voter_id = Some("EA-2022".to_string());

        let mut record = record("parl.2024-07-04");
        record.election_title = Some("".to_string());
        record.explanation = None;
        record.requires_voter_id = Some(" ".to_string());
        record.voting_system = None;

        assert!(!enrich_election(&mut election, &record));
        assert_eq!(election.name, "UK Parliamentary general election");
        assert_eq!(election.description.as_deref(), Some("Existing description"));
        assert_eq!(election.requires_voter_id.as_deref(), Some("EA-2022"));

        record.election_title = Some("General election 2024".to_string());
        assert!(enrich_election(&mut election, &record));
        assert_eq!(election.name, "General election 2024");
    }
}
