//! The import run: read the candidacy feed, merge each ballot into the local
//! store, then tidy up.
//!
//! A run walks the feed a page at a time. Each page is merged inside one store
//! transaction, so a page either lands completely or not at all. After the
//! last page some post-passes run, depending on which filters were used:
//!
//! 1. cancelled ballots are linked to their replacements (only when the feed
//!    was read in full, or for all current elections);
//! 2. registry records modified in the last hour are re-applied (incremental
//!    runs only);
//! 3. elections and ballots deleted in the registry are removed (on request);
//! 4. posts no ballot refers to are deleted.
//!
//! Re-running with the same upstream data leaves the store unchanged.

use std::fmt::{Display, Formatter};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use log::{debug, info, warn};
use mongodb::bson;
use rocket::serde::json::{serde_json, Value};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::feed::{BallotRecord, CandidacyRecord},
    db::{Ballot, BallotResults, Candidacy, Election, Person, Post},
};
use crate::ranking::rank_ballot;
use crate::store::BallotStore;
use crate::sync::{
    elections::ElectionImporter,
    fetch::Fetch,
    merge::{enrich_ballot, Overwrite},
    metadata::MetadataCache,
    options::{ImportOptions, RunState},
    paginator::Paginator,
    posts::PostImporter,
    replacement,
};

/// Bulk snapshot of every ballot, relative to the candidacy feed's base URL.
pub const SNAPSHOT_PATH: &str = "/media/cached-api/latest/ballots-000001.json";

/// Base URL prefixes of development servers, which don't publish a snapshot.
const LOCAL_PREFIXES: [&str; 2] = ["http://localhost", "http://127.0.0.1"];

/// Modification time assumed when no ballot has one yet. The feed did not
/// track modifications before this.
fn default_last_updated() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 10, 27, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Counts of what one run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub pages: usize,
    pub ballots: usize,
    pub created: usize,
    pub skipped: usize,
    pub malformed: usize,
    pub replacements_linked: usize,
    pub reconciled: usize,
    pub deleted_elections: u64,
    pub deleted_ballots: u64,
    pub orphan_posts: u64,
}

impl Display for ImportSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ballots from {} pages ({} new, {} skipped, {} malformed); \
             {} replacements linked; {} reconciled; \
             deleted {} elections, {} ballots and {} orphan posts",
            self.ballots,
            self.pages,
            self.created,
            self.skipped,
            self.malformed,
            self.replacements_linked,
            self.reconciled,
            self.deleted_elections,
            self.deleted_ballots,
            self.orphan_posts,
        )
    }
}

/// Imports ballots, with their elections, posts and candidacies, from the
/// candidacy feed. One importer performs one run.
pub struct BallotImporter<'s> {
    store: &'s dyn BallotStore,
    fetcher: Arc<dyn Fetch>,
    options: ImportOptions,
    feed_url: String,
    api_key: Option<String>,
    page_size: u32,
    cache: MetadataCache,
    elections: ElectionImporter,
    posts: PostImporter,
    state: RunState,
    now: DateTime<Utc>,
}

impl<'s> BallotImporter<'s> {
    pub fn new(
        store: &'s dyn BallotStore,
        fetcher: Arc<dyn Fetch>,
        config: &Config,
        options: ImportOptions,
    ) -> Self {
        let cache = MetadataCache::new(fetcher.clone(), config.geography_registry_url());
        Self {
            store,
            fetcher,
            options,
            feed_url: config.candidacy_feed_url().to_string(),
            api_key: config.candidacy_feed_api_key().map(str::to_string),
            page_size: config.page_size(),
            cache,
            elections: ElectionImporter::new(),
            posts: PostImporter::new(),
            state: RunState::Idle,
            now: Utc::now(),
        }
    }

    /// Pin the clock used for the registry's time windows.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    fn overwrite(&self) -> Overwrite {
        (&self.options).into()
    }

    fn feed_is_local(&self) -> bool {
        LOCAL_PREFIXES
            .iter()
            .any(|prefix| self.feed_url.starts_with(prefix))
    }

    /// The first page to read: the bulk snapshot for a full import, otherwise
    /// the filtered listing.
    pub async fn import_url(&self) -> Result<String> {
        if self.options.is_full_import() && !self.feed_is_local() {
            return Ok(format!("{}{SNAPSHOT_PATH}", self.feed_url));
        }

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(api_key) = &self.api_key {
            params.push(("auth_token", api_key.clone()));
        }
        if self.options.current_only {
            params.push(("current", "True".to_string()));
        }
        let last_updated = match (self.options.since, self.options.recently_updated) {
            (Some(since), _) => Some(since),
            (None, true) => Some(
                self.store
                    .latest_upstream_modified()
                    .await?
                    .unwrap_or_else(default_last_updated),
            ),
            (None, false) => None,
        };
        if let Some(last_updated) = last_updated {
            params.push((
                "last_updated",
                last_updated.to_rfc3339_opts(SecondsFormat::Secs, false),
            ));
        }
        if self.options.current_only || self.options.is_incremental() {
            params.push(("page_size", self.page_size.to_string()));
        }

        let base = format!("{}/api/next/ballots/", self.feed_url);
        let url = reqwest::Url::parse_with_params(&base, &params)
            .map_err(|e| Error::validation(format!("Bad candidacy feed URL {base}: {e}")))?;
        Ok(url.to_string())
    }

    /// Perform the run. Feed and registry URLs are written to `sink` as
    /// they are fetched.
    pub async fn run(&mut self, sink: &mut (dyn Write + Send)) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        info!("Starting ballot import with {:?}", self.options);

        if self.options.should_prewarm() {
            let started = Instant::now();
            self.cache
                .prewarm(!self.options.force_metadata, sink)
                .await?;
            info!("Prewarming the metadata cache took {:?}", started.elapsed());
        }

        let started = Instant::now();
        let url = self.import_url().await?;
        let mut pages = Paginator::<Value>::new(self.fetcher.clone(), url, sink);
        loop {
            self.state = RunState::Fetching;
            let results = match pages.next_page().await? {
                Some(results) => results,
                None => break,
            };
            self.state = RunState::Merging;
            summary.pages += 1;
            self.import_page(results, &mut summary).await?;
        }
        drop(pages);
        info!("Importing ballots took {:?}", started.elapsed());

        if self.options.covers_cancellations() {
            self.state = RunState::LinkingReplacements;
            let started = Instant::now();
            self.attach_cancelled_ballot_info(&mut summary).await?;
            info!("Linking replacements took {:?}", started.elapsed());
        }

        if self.options.is_incremental() {
            self.state = RunState::ReconcilingMetadata;
            let started = Instant::now();
            self.reconcile_recently_modified(sink, &mut summary).await?;
            info!("Reconciling registry changes took {:?}", started.elapsed());
        }

        self.state = RunState::CleaningOrphans;
        let started = Instant::now();
        if self.options.remove_deleted {
            self.remove_deleted(sink, &mut summary).await?;
        }
        summary.orphan_posts = self.store.delete_orphan_posts().await?;
        info!("Cleaning up took {:?}", started.elapsed());

        self.state = RunState::Done;
        info!("Import finished: {summary}");
        Ok(summary)
    }

    /// Merge one page inside a store transaction.
    async fn import_page(&mut self, results: Vec<Value>, summary: &mut ImportSummary) -> Result<()> {
        self.store.begin_page().await?;
        let mut merged = ImportSummary::default();
        let outcome = self.add_ballots(results, &mut merged).await;
        match outcome {
            Ok(()) => {
                self.store.commit_page().await?;
                summary.ballots += merged.ballots;
                summary.created += merged.created;
                summary.skipped += merged.skipped;
                summary.malformed += merged.malformed;
                Ok(())
            }
            Err(e) => {
                warn!("Rolling back page: {e}");
                if let Err(abort) = self.store.abort_page().await {
                    warn!("Rollback failed: {abort}");
                }
                Err(e)
            }
        }
    }

    async fn add_ballots(&mut self, results: Vec<Value>, summary: &mut ImportSummary) -> Result<()> {
        for result in results {
            let record = match serde_json::from_value::<BallotRecord>(result) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed ballot: {e}");
                    summary.malformed += 1;
                    continue;
                }
            };
            self.add_ballot(&record, summary).await?;
        }
        Ok(())
    }

    async fn add_ballot(&mut self, record: &BallotRecord, summary: &mut ImportSummary) -> Result<()> {
        let id = record.ballot_paper_id.trim();
        debug!("{id}");

        let election = self
            .elections
            .upsert(self.store, &mut self.cache, &record.election)
            .await?;
        let mut post = match self.posts.upsert(self.store, &record.post).await? {
            Some(post) => post,
            None => {
                warn!("Skipping {id}: no post ID or slug");
                summary.skipped += 1;
                return Ok(());
            }
        };

        let existing = self.store.ballot(id).await?;
        let created = existing.is_none();
        let mut ballot = existing.unwrap_or_else(|| {
            Ballot::new(id.to_string(), election.slug.clone(), post.id.clone())
        });
        self.apply_record(&mut ballot, &election, &post, record);
        self.store.save_ballot(&ballot).await?;

        if self.options.is_incremental() {
            if let Some(replaces) = &record.replaces {
                replacement::link(self.store, id, replaces).await?;
            }
        }

        if election.current || self.options.force_metadata {
            self.import_ballot_metadata(&mut ballot, &mut post).await?;
        }

        if !self.options.exclude_candidacies {
            self.replace_candidacies(&ballot, &election, &record.candidacies)
                .await?;
        }

        if created {
            info!("Added new ballot: {id}");
            summary.created += 1;
        }
        summary.ballots += 1;
        Ok(())
    }

    /// Copy the feed's view of a ballot onto the local one.
    fn apply_record(&self, ballot: &mut Ballot, election: &Election, post: &Post, record: &BallotRecord) {
        let winner_count = record.winner_count.filter(|count| *count > 0);

        ballot.election_slug = election.slug.clone();
        ballot.post_id = post.id.clone();
        ballot.winner_count = winner_count.unwrap_or(1);
        ballot.cancelled = record.cancelled;
        ballot.locked = record.candidates_locked;
        if (record.candidates_locked || record.cancelled) && winner_count.is_some() {
            ballot.contested = !record.uncontested;
        }
        // Outside incremental runs the feed reports when the ballot row itself
        // changed, not its candidacies.
        if self.options.is_incremental() {
            ballot.upstream_modified = record.last_updated.map(bson::DateTime::from_chrono);
        }
        if let Some(results) = &record.results {
            ballot.results = BallotResults {
                ballot_papers_issued: results.num_turnout_reported,
                electorate: results.total_electorate,
                turnout: results.turnout_percentage,
                spoilt_ballots: results.num_spoilt_ballots,
            };
        }
    }

    /// Enrich a ballot and its post from the geography registry and save both.
    async fn import_ballot_metadata(&mut self, ballot: &mut Ballot, post: &mut Post) -> Result<()> {
        let registry = self.cache.get(&ballot.ballot_paper_id).await?;
        enrich_ballot(ballot, post, registry.as_deref(), self.overwrite()).map_err(|e| {
            Error::validation(format!("{} has {e}", ballot.ballot_paper_id))
        })?;
        self.store.save_post(post).await?;
        self.posts.remember(post);
        self.store.save_ballot(ballot).await?;
        Ok(())
    }

    /// Flush a ballot's candidacies and recreate them from the feed, then rank
    /// them if any votes are known.
    async fn replace_candidacies(
        &self,
        ballot: &Ballot,
        election: &Election,
        records: &[CandidacyRecord],
    ) -> Result<()> {
        let id = &ballot.ballot_paper_id;
        self.store.delete_candidacies_for_ballot(id).await?;

        for record in records {
            let person = Person {
                id: record.person.id,
                name: record.person.name.clone(),
            };
            self.store.save_person(&person).await?;

            let party_id = record.party_id().map(str::to_string);
            let mut previous_party_affiliations: Vec<String> = Vec::new();
            for party in &record.previous_party_affiliations {
                let previous = &party.legacy_slug;
                if party_id.as_ref() == Some(previous)
                    || previous_party_affiliations.contains(previous)
                {
                    continue;
                }
                if self.store.party(previous).await?.is_none() {
                    debug!("Ignoring unknown previous party {previous} for person {}", person.id);
                    continue;
                }
                previous_party_affiliations.push(previous.clone());
            }

            let candidacy = Candidacy {
                id: Candidacy::id_for(id, person.id),
                person_id: person.id,
                ballot_paper_id: id.clone(),
                post_id: ballot.post_id.clone(),
                election_slug: election.slug.clone(),
                party_id,
                party_name: record.party_name.clone(),
                party_description: record.party_description_text.clone(),
                list_position: record.party_list_position,
                elected: record.elected(),
                votes_cast: record.votes_cast(),
                rank: None,
                deselected: record.deselected,
                deselected_source: record.deselected_source.clone(),
                previous_party_affiliations,
            };
            self.store.insert_candidacy(&candidacy).await?;
        }

        if records.iter().any(|record| record.votes_cast().is_some()) {
            rank_ballot(self.store, id).await?;
        }
        Ok(())
    }

    /// Link cancelled ballots to the ballots replacing them, now that both
    /// should be in the store, and refresh their metadata from the registry.
    async fn attach_cancelled_ballot_info(&mut self, summary: &mut ImportSummary) -> Result<()> {
        for mut ballot in self.store.cancelled_ballots().await? {
            if self.options.current_only {
                let current = self
                    .store
                    .election(&ballot.election_slug)
                    .await?
                    .map_or(false, |election| election.current);
                if !current {
                    continue;
                }
            }

            let registry = match self.cache.get(&ballot.ballot_paper_id).await? {
                Some(registry) => registry,
                None => continue,
            };
            // Cancellation notices arrive after the ballot was first imported.
            if ballot.metadata != registry.metadata {
                ballot.metadata = registry.metadata.clone();
                self.store.save_ballot(&ballot).await?;
            }
            if let Some(replaced_by) = &registry.replaced_by {
                if replacement::link(self.store, replaced_by, &ballot.ballot_paper_id).await? {
                    summary.replacements_linked += 1;
                }
            }
        }
        Ok(())
    }

    /// Re-apply registry records modified in the last hour to the elections
    /// and ballots they describe.
    ///
    /// Election groups fan out to their children. A group ID with only two
    /// segments and no children is never yielded by the registry walk, so a
    /// change to such an election alone is picked up by the next full import.
    async fn reconcile_recently_modified(
        &mut self,
        sink: &mut (dyn Write + Send),
        summary: &mut ImportSummary,
    ) -> Result<()> {
        let mut recent = self.cache.recently_modified(self.now, sink);
        while let Some(election_id) = recent.next(&mut self.cache).await? {
            let registry = match self.cache.get(&election_id).await? {
                Some(registry) => registry,
                None => continue,
            };
            let segments = election_id.split('.').count();
            let targets = if segments == 2 && registry.is_election_group() {
                registry.children.clone()
            } else if segments > 2 && registry.is_leaf_or_subtype() {
                vec![election_id.clone()]
            } else {
                Vec::new()
            };

            for target in targets {
                if self.reconcile(&target).await? {
                    summary.reconciled += 1;
                }
            }
        }
        Ok(())
    }

    /// Refresh whichever of an election and a ballot exist locally under `id`.
    async fn reconcile(&mut self, id: &str) -> Result<bool> {
        let election = self.store.election(id).await?;
        let ballot = self.store.ballot(id).await?;
        if election.is_none() && ballot.is_none() {
            info!("Neither election nor ballot {id} exists");
            return Ok(false);
        }

        if let Some(mut election) = election {
            debug!("Importing registry metadata for election {id}");
            self.elections
                .import_metadata(self.store, &mut self.cache, &mut election)
                .await?;
        }
        if let Some(mut ballot) = ballot {
            debug!("Importing registry metadata for ballot {id}");
            let mut post = self
                .store
                .post(&ballot.post_id)
                .await?
                .ok_or_else(|| Error::not_found(format!("post {} of {id}", ballot.post_id)))?;
            self.import_ballot_metadata(&mut ballot, &mut post).await?;
        }
        Ok(true)
    }

    /// Delete elections and ballots soft-deleted in the registry.
    async fn remove_deleted(
        &mut self,
        sink: &mut (dyn Write + Send),
        summary: &mut ImportSummary,
    ) -> Result<()> {
        let ids = self.cache.deleted_ids(self.today(), sink).await?;
        if ids.is_empty() {
            return Ok(());
        }
        summary.deleted_elections = self.store.delete_elections(&ids).await?;
        summary.deleted_ballots = self.store.delete_ballots(&ids).await?;
        info!(
            "Removed {} elections and {} ballots deleted upstream",
            summary.deleted_elections, summary.deleted_ballots
        );
        Ok(())
    }
}
