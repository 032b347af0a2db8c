use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::VotingSystem,
    db::{Ballot, Candidacy, Election},
};
use crate::ranking::{rank_label, Standing};

/// A ballot with the election fields the rendering layer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotSummary {
    pub ballot_paper_id: String,
    pub election_slug: String,
    pub election_name: String,
    pub election_date: NaiveDate,
    pub post_id: String,
    pub cancelled: bool,
    pub contested: bool,
    pub locked: bool,
    pub winner_count: u32,
    pub replaced_by: Option<String>,
    pub voting_system: Option<VotingSystem>,
    pub requires_voter_id: Option<String>,
    pub cancellation_reason: Option<String>,
}

impl BallotSummary {
    pub fn new(ballot: Ballot, election: &Election) -> Self {
        Self {
            ballot_paper_id: ballot.ballot_paper_id,
            election_slug: ballot.election_slug,
            election_name: election.name.clone(),
            election_date: election.date,
            post_id: ballot.post_id,
            cancelled: ballot.cancelled,
            contested: ballot.contested,
            locked: ballot.locked,
            winner_count: ballot.winner_count,
            replaced_by: ballot.replaced_by,
            // Fall back to the election-wide voting system.
            voting_system: ballot.voting_system.or_else(|| election.voting_system.clone()),
            requires_voter_id: ballot.requires_voter_id,
            cancellation_reason: ballot.cancellation_reason,
        }
    }
}

/// A ballot with its candidacies, for the ballot page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallotDescription {
    #[serde(flatten)]
    pub summary: BallotSummary,
    pub candidacies: Vec<CandidacyDescription>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidacyDescription {
    pub person_id: i64,
    pub party_id: Option<String>,
    pub party_name: String,
    pub party_description: Option<String>,
    pub list_position: Option<i32>,
    pub elected: Option<bool>,
    pub votes_cast: Option<u64>,
    pub rank: Option<u32>,
    /// E.g. `Joint 2nd / 4 candidates`. Only present once votes are known.
    pub rank_label: Option<String>,
    pub deselected: bool,
}

impl BallotDescription {
    /// Describe a ballot. Candidacies are listed in finishing order when
    /// ranked, otherwise in the order given.
    pub fn new(ballot: Ballot, election: &Election, mut candidacies: Vec<Candidacy>) -> Self {
        candidacies.sort_by_key(|candidacy| candidacy.rank.unwrap_or(u32::MAX));
        let standings = Standing::for_candidacies(&candidacies);
        let total = candidacies.len();
        let candidacies = candidacies
            .into_iter()
            .map(|candidacy| {
                let rank_label = standings
                    .iter()
                    .find(|standing| standing.candidacy_id == candidacy.id)
                    .map(|standing| rank_label(standing, total));
                CandidacyDescription {
                    person_id: candidacy.person_id,
                    party_id: candidacy.party_id,
                    party_name: candidacy.party_name,
                    party_description: candidacy.party_description,
                    list_position: candidacy.list_position,
                    elected: candidacy.elected,
                    votes_cast: candidacy.votes_cast,
                    rank: candidacy.rank,
                    rank_label,
                    deselected: candidacy.deselected,
                }
            })
            .collect();

        Self {
            summary: BallotSummary::new(ballot, election),
            candidacies,
        }
    }
}
