use std::collections::HashMap;

use log::{debug, info};

use crate::error::Result;
use crate::model::{api::feed::ElectionRef, common::ballot_weight, db::Election};
use crate::store::BallotStore;
use crate::sync::{merge::enrich_election, metadata::MetadataCache};

/// Creates and updates elections from the candidacy feed, once per slug per run.
#[derive(Debug, Default)]
pub struct ElectionImporter {
    seen: HashMap<String, Election>,
}

impl ElectionImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the election a ballot belongs to, enriched from the registry.
    pub async fn upsert(
        &mut self,
        store: &dyn BallotStore,
        cache: &mut MetadataCache,
        record: &ElectionRef,
    ) -> Result<Election> {
        if let Some(election) = self.seen.get(&record.election_id) {
            return Ok(election.clone());
        }

        let slug = record.election_id.trim().to_string();
        let name = record.name.trim().to_string();
        let mut election = match store.election(&slug).await? {
            Some(mut existing) => {
                existing.name = name;
                existing.date = record.election_date;
                existing.current = record.current;
                existing
            }
            None => {
                info!("Adding election {slug}");
                Election::new(slug.clone(), name, record.election_date, record.current)
            }
        };
        election.uses_lists = record.party_lists_in_use;
        election.weight = ballot_weight(&slug);

        if let Some(registry) = cache.get(&slug).await? {
            enrich_election(&mut election, &registry);
        }
        store.save_election(&election).await?;

        self.seen.insert(record.election_id.clone(), election.clone());
        Ok(election)
    }

    /// Refresh an existing election's registry-derived fields.
    ///
    /// Returns true if the election changed.
    pub async fn import_metadata(
        &mut self,
        store: &dyn BallotStore,
        cache: &mut MetadataCache,
        election: &mut Election,
    ) -> Result<bool> {
        let registry = match cache.get(&election.slug).await? {
            Some(registry) => registry,
            None => return Ok(false),
        };
        if !enrich_election(election, &registry) {
            return Ok(false);
        }
        store.save_election(election).await?;
        debug!("Updated {}", election.slug);
        if let Some(seen) = self.seen.get_mut(&election.slug) {
            *seen = election.clone();
        }
        Ok(true)
    }
}
