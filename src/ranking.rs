//! Finishing positions for candidacies, derived from votes cast.

use log::debug;

use crate::error::Result;
use crate::model::db::Candidacy;
use crate::store::BallotStore;

/// Where one candidacy finished on its ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    pub candidacy_id: String,
    /// 1-based position in descending vote order. This is what gets stored.
    pub rank: u32,
    /// The candidacy has the same number of votes as a neighbour.
    pub joint: bool,
    /// Position shown to users: tied candidacies all show the position of
    /// the first member of their tie.
    pub display_rank: u32,
}

impl Standing {
    /// Rank every candidacy on one ballot that has a vote count.
    /// Candidacies without votes are not ranked.
    pub fn for_candidacies(candidacies: &[Candidacy]) -> Vec<Standing> {
        let mut counted: Vec<(&str, u64)> = candidacies
            .iter()
            .filter_map(|c| c.votes_cast.map(|votes| (c.id.as_str(), votes)))
            .collect();
        // Stable, so equal counts keep their incoming order.
        counted.sort_by(|a, b| b.1.cmp(&a.1));

        let mut standings: Vec<Standing> = Vec::with_capacity(counted.len());
        for (index, (id, votes)) in counted.iter().enumerate() {
            let rank = index as u32 + 1;
            let tied_with_previous = index > 0 && counted[index - 1].1 == *votes;
            let tied_with_next = counted.get(index + 1).map_or(false, |next| next.1 == *votes);
            let display_rank = match standings.last() {
                Some(previous) if tied_with_previous => previous.display_rank,
                _ => rank,
            };
            standings.push(Standing {
                candidacy_id: id.to_string(),
                rank,
                joint: tied_with_previous || tied_with_next,
                display_rank,
            });
        }
        standings
    }
}

/// Human-readable standing, e.g. `Joint 2nd / 4 candidates`.
pub fn rank_label(standing: &Standing, total: usize) -> String {
    let plural = if total == 1 { "candidate" } else { "candidates" };
    let position = ordinal(standing.display_rank);
    if standing.joint {
        format!("Joint {position} / {total} {plural}")
    } else {
        format!("{position} / {total} {plural}")
    }
}

fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Recompute and store ranks for every candidacy on a ballot.
///
/// Returns false without writing anything if no candidacy has a vote count.
pub async fn rank_ballot(store: &dyn BallotStore, ballot_paper_id: &str) -> Result<bool> {
    let candidacies = store.candidacies_for_ballot(ballot_paper_id).await?;
    if candidacies.iter().all(|c| c.votes_cast.is_none()) {
        return Ok(false);
    }

    let standings = Standing::for_candidacies(&candidacies);
    let ranks = candidacies
        .iter()
        .map(|candidacy| {
            let rank = standings
                .iter()
                .find(|standing| standing.candidacy_id == candidacy.id)
                .map(|standing| standing.rank);
            (candidacy.id.clone(), rank)
        })
        .collect::<Vec<_>>();
    debug!("Ranking {} candidacies on {ballot_paper_id}", ranks.len());
    store.set_ranks(ballot_paper_id, &ranks).await?;
    Ok(true)
}
