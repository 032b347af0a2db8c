use std::collections::HashSet;

use log::{debug, warn};

use crate::error::Result;
use crate::store::BallotStore;

/// Record that `ballot_paper_id` replaces the ballot `replaced_id`.
///
/// Returns false, writing nothing, if `replaced_id` is empty, either ballot is
/// unknown, both are the same ballot, or the link would form a cycle. Linking
/// twice is a no-op.
pub async fn link(
    store: &dyn BallotStore,
    ballot_paper_id: &str,
    replaced_id: &str,
) -> Result<bool> {
    let replaced_id = replaced_id.trim();
    if replaced_id.is_empty() {
        return Ok(false);
    }
    if replaced_id == ballot_paper_id {
        warn!("Refusing to mark {ballot_paper_id} as replacing itself");
        return Ok(false);
    }

    if store.ballot(ballot_paper_id).await?.is_none() {
        debug!("{replaced_id} is replaced by {ballot_paper_id}, which we don't have yet");
        return Ok(false);
    }
    let mut replaced = match store.ballot(replaced_id).await? {
        Some(replaced) => replaced,
        None => {
            debug!("{ballot_paper_id} replaces {replaced_id}, which we don't have yet");
            return Ok(false);
        }
    };
    if replaced.replaced_by.as_deref() == Some(ballot_paper_id) {
        return Ok(true);
    }
    if leads_to(store, ballot_paper_id, replaced_id).await? {
        warn!("Refusing to link {replaced_id} -> {ballot_paper_id}: it would form a cycle");
        return Ok(false);
    }

    replaced.replaced_by = Some(ballot_paper_id.to_string());
    store.save_ballot(&replaced).await?;
    debug!("Linked {replaced_id} -> {ballot_paper_id}");
    Ok(true)
}

/// Does following `replaced_by` from `start` reach `target`?
async fn leads_to(store: &dyn BallotStore, start: &str, target: &str) -> Result<bool> {
    let mut seen = HashSet::new();
    let mut current = start.to_string();
    while seen.insert(current.clone()) {
        let next = match store.ballot(&current).await? {
            Some(ballot) => ballot.replaced_by,
            None => None,
        };
        match next {
            Some(next) if next == target => return Ok(true),
            Some(next) => current = next,
            None => return Ok(false),
        }
    }
    Ok(false)
}
