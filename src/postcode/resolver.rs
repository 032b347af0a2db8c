use std::collections::HashMap;

use chrono::NaiveDate;
use log::{debug, warn};

use super::{cache::PostcodeCache, client::PostcodeClient};
use crate::error::Result;
use crate::model::{
    api::{
        ballot::BallotSummary,
        postcode::{PostcodeResponse, PostcodeView},
    },
    db::{Ballot, Election},
};
use crate::store::BallotStore;

/// Canonical form of a postcode: upper case without spaces.
pub fn normalise_postcode(postcode: &str) -> String {
    postcode
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Cache key for a lookup, distinct per address within a postcode.
pub fn cache_key(postcode: &str, address: Option<&str>) -> String {
    match address {
        Some(address) => format!("{}:{address}", normalise_postcode(postcode)),
        None => normalise_postcode(postcode),
    }
}

/// Sort ballots for display: upcoming before past, then by polling day, then
/// in the order the postcode service listed them.
pub fn order_ballots(
    ballots: &mut [(Ballot, Election)],
    upstream_order: &[String],
    today: NaiveDate,
) {
    let position = |ballot: &Ballot| {
        upstream_order
            .iter()
            .position(|id| *id == ballot.ballot_paper_id)
            .unwrap_or(usize::MAX)
    };
    ballots.sort_by_key(|(ballot, election)| {
        (election.in_past(today), election.date, position(ballot))
    });
}

/// Turns a postcode into the ballots a voter there will see.
pub struct PostcodeResolver {
    client: PostcodeClient,
    cache: PostcodeCache,
}

impl PostcodeResolver {
    pub fn new(client: PostcodeClient, cache_capacity: usize) -> Self {
        Self {
            client,
            cache: PostcodeCache::new(cache_capacity),
        }
    }

    /// Ask the postcode service, unless we already have its answer.
    /// Failed lookups are not cached.
    async fn lookup(&self, postcode: &str, address: Option<&str>) -> Result<PostcodeResponse> {
        let key = cache_key(postcode, address);
        if let Some(cached) = self.cache.get(&key).await {
            debug!("Postcode cache hit for {key}");
            return Ok(cached);
        }
        let response = self.client.lookup(postcode, address).await?;
        self.cache.insert(key, response.clone()).await;
        Ok(response)
    }

    /// Resolve a postcode, or one address within it, against the local store.
    ///
    /// Ballots the postcode service mentions but the store doesn't hold are
    /// left out.
    pub async fn resolve(
        &self,
        store: &dyn BallotStore,
        postcode: &str,
        address: Option<&str>,
        today: NaiveDate,
    ) -> Result<PostcodeView> {
        let postcode = normalise_postcode(postcode);
        let response = self.lookup(&postcode, address).await?;

        if response.address_picker {
            return Ok(PostcodeView::AddressPicker {
                postcode,
                addresses: response.addresses,
            });
        }

        let ids = response.ballot_paper_ids();
        let mut elections: HashMap<String, Option<Election>> = HashMap::new();
        let mut ballots = Vec::new();
        for ballot in store.ballots(&ids).await? {
            if !elections.contains_key(&ballot.election_slug) {
                let election = store.election(&ballot.election_slug).await?;
                elections.insert(ballot.election_slug.clone(), election);
            }
            match elections.get(&ballot.election_slug).cloned().flatten() {
                Some(election) => ballots.push((ballot, election)),
                None => warn!(
                    "Ballot {} refers to missing election {}",
                    ballot.ballot_paper_id, ballot.election_slug
                ),
            }
        }
        order_ballots(&mut ballots, &ids, today);

        let first_date = response.dates.into_iter().next();
        let (polling_station, postal_vote) = match first_date {
            Some(date) => (date.polling_station, date.postal_vote),
            None => (None, None),
        };
        Ok(PostcodeView::Ballots {
            postcode,
            ballots: ballots
                .into_iter()
                .map(|(ballot, election)| BallotSummary::new(ballot, &election))
                .collect(),
            polling_station,
            postal_vote,
            electoral_services: response.electoral_services,
            registration: response.registration,
        })
    }
}
