use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use log::debug;
use rocket::serde::json::serde_json;
use rocket::tokio::sync::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::BallotStore;
use crate::error::{Error, Result};
use crate::model::db::{Ballot, Candidacy, Election, Party, Person, Post};

#[derive(Debug, Clone, Default, Serialize)]
struct Tables {
    elections: BTreeMap<String, Election>,
    posts: BTreeMap<String, Post>,
    ballots: BTreeMap<String, Ballot>,
    candidacies: BTreeMap<String, Candidacy>,
    people: BTreeMap<i64, Person>,
    parties: BTreeMap<String, Party>,
}

#[derive(Debug, Default)]
struct State {
    tables: Tables,
    /// Copy of the tables taken when the current page began.
    checkpoint: Option<Tables>,
}

/// Number of records of each kind held by a [`MemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub elections: usize,
    pub posts: usize,
    pub ballots: usize,
    pub candidacies: usize,
    pub people: usize,
}

impl Display for StoreCounts {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} elections, {} posts, {} ballots, {} candidacies, {} people",
            self.elections, self.posts, self.ballots, self.candidacies, self.people
        )
    }
}

/// A store that lives only as long as the process. Used for dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a party, as the party import would.
    pub async fn add_party(&self, party: Party) {
        let mut state = self.state.lock().await;
        state.tables.parties.insert(party.id.clone(), party);
    }

    pub async fn counts(&self) -> StoreCounts {
        let state = self.state.lock().await;
        let tables = &state.tables;
        StoreCounts {
            elections: tables.elections.len(),
            posts: tables.posts.len(),
            ballots: tables.ballots.len(),
            candidacies: tables.candidacies.len(),
            people: tables.people.len(),
        }
    }

    /// SHA-256 over the whole store contents, hex encoded. Two stores with
    /// the same contents have the same digest.
    pub async fn digest(&self) -> Result<String> {
        let state = self.state.lock().await;
        let bytes = serde_json::to_vec(&state.tables).map_err(|source| Error::Decode {
            url: "memory store".to_string(),
            source,
        })?;
        Ok(HEXLOWER.encode(&Sha256::digest(bytes)))
    }
}

#[rocket::async_trait]
impl BallotStore for MemoryStore {
    async fn begin_page(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.checkpoint = Some(state.tables.clone());
        Ok(())
    }

    async fn commit_page(&self) -> Result<()> {
        self.state.lock().await.checkpoint = None;
        Ok(())
    }

    async fn abort_page(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(checkpoint) = state.checkpoint.take() {
            debug!("Rolling back page");
            state.tables = checkpoint;
        }
        Ok(())
    }

    async fn election(&self, slug: &str) -> Result<Option<Election>> {
        Ok(self.state.lock().await.tables.elections.get(slug).cloned())
    }

    async fn save_election(&self, election: &Election) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .tables
            .elections
            .insert(election.slug.clone(), election.clone());
        Ok(())
    }

    async fn delete_elections(&self, slugs: &[String]) -> Result<u64> {
        let mut state = self.state.lock().await;
        let tables = &mut state.tables;
        let deleted = slugs
            .iter()
            .filter(|slug| tables.elections.remove(*slug).is_some())
            .count();
        tables
            .ballots
            .retain(|_, ballot| !slugs.contains(&ballot.election_slug));
        tables
            .candidacies
            .retain(|_, candidacy| !slugs.contains(&candidacy.election_slug));
        Ok(deleted as u64)
    }

    async fn post(&self, id: &str) -> Result<Option<Post>> {
        Ok(self.state.lock().await.tables.posts.get(id).cloned())
    }

    async fn save_post(&self, post: &Post) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tables.posts.insert(post.id.clone(), post.clone());
        Ok(())
    }

    async fn delete_orphan_posts(&self) -> Result<u64> {
        let mut state = self.state.lock().await;
        let tables = &mut state.tables;
        let referenced: BTreeSet<&String> =
            tables.ballots.values().map(|ballot| &ballot.post_id).collect();
        let orphans: Vec<String> = tables
            .posts
            .keys()
            .filter(|id| !referenced.contains(id))
            .cloned()
            .collect();
        for id in &orphans {
            tables.posts.remove(id);
        }
        Ok(orphans.len() as u64)
    }

    async fn ballot(&self, ballot_paper_id: &str) -> Result<Option<Ballot>> {
        Ok(self
            .state
            .lock()
            .await
            .tables
            .ballots
            .get(ballot_paper_id)
            .cloned())
    }

    async fn ballots(&self, ballot_paper_ids: &[String]) -> Result<Vec<Ballot>> {
        let state = self.state.lock().await;
        Ok(ballot_paper_ids
            .iter()
            .filter_map(|id| state.tables.ballots.get(id).cloned())
            .collect())
    }

    async fn save_ballot(&self, ballot: &Ballot) -> Result<()> {
        let mut state = self.state.lock().await;
        state
            .tables
            .ballots
            .insert(ballot.ballot_paper_id.clone(), ballot.clone());
        Ok(())
    }

    async fn cancelled_ballots(&self) -> Result<Vec<Ballot>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .ballots
            .values()
            .filter(|ballot| ballot.cancelled)
            .cloned()
            .collect())
    }

    async fn delete_ballots(&self, ballot_paper_ids: &[String]) -> Result<u64> {
        let mut state = self.state.lock().await;
        let tables = &mut state.tables;
        let mut deleted = 0;
        for id in ballot_paper_ids {
            if tables.ballots.remove(id).is_some() {
                deleted += 1;
                tables
                    .candidacies
                    .retain(|_, candidacy| &candidacy.ballot_paper_id != id);
            }
        }
        Ok(deleted)
    }

    async fn latest_upstream_modified(&self) -> Result<Option<DateTime<Utc>>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .ballots
            .values()
            .filter_map(|ballot| ballot.upstream_modified)
            .max()
            .map(|modified| modified.to_chrono()))
    }

    async fn candidacies_for_ballot(&self, ballot_paper_id: &str) -> Result<Vec<Candidacy>> {
        let state = self.state.lock().await;
        Ok(state
            .tables
            .candidacies
            .values()
            .filter(|candidacy| candidacy.ballot_paper_id == ballot_paper_id)
            .cloned()
            .collect())
    }

    async fn insert_candidacy(&self, candidacy: &Candidacy) -> Result<()> {
        let mut state = self.state.lock().await;
        let duplicate = state.tables.candidacies.values().any(|existing| {
            existing.id == candidacy.id
                || (existing.person_id == candidacy.person_id
                    && existing.post_id == candidacy.post_id
                    && existing.election_slug == candidacy.election_slug)
        });
        if duplicate {
            return Err(Error::validation(format!(
                "Duplicate candidacy for person {} on {}",
                candidacy.person_id, candidacy.ballot_paper_id
            )));
        }
        state
            .tables
            .candidacies
            .insert(candidacy.id.clone(), candidacy.clone());
        Ok(())
    }

    async fn delete_candidacies_for_ballot(&self, ballot_paper_id: &str) -> Result<u64> {
        let mut state = self.state.lock().await;
        let before = state.tables.candidacies.len();
        state
            .tables
            .candidacies
            .retain(|_, candidacy| candidacy.ballot_paper_id != ballot_paper_id);
        Ok((before - state.tables.candidacies.len()) as u64)
    }

    async fn set_ranks(&self, ballot_paper_id: &str, ranks: &[(String, Option<u32>)]) -> Result<()> {
        let mut state = self.state.lock().await;
        for (id, rank) in ranks {
            if let Some(candidacy) = state.tables.candidacies.get_mut(id) {
                if candidacy.ballot_paper_id == ballot_paper_id {
                    candidacy.rank = *rank;
                }
            }
        }
        Ok(())
    }

    async fn save_person(&self, person: &Person) -> Result<()> {
        let mut state = self.state.lock().await;
        state.tables.people.insert(person.id, person.clone());
        Ok(())
    }

    async fn party(&self, id: &str) -> Result<Option<Party>> {
        Ok(self.state.lock().await.tables.parties.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rocket::async_test]
    async fn aborted_pages_roll_back() {
        let store = MemoryStore::new();
        store.save_election(&Election::example_parl()).await.unwrap();
        let before = store.digest().await.unwrap();

        store.begin_page().await.unwrap();
        store.save_election(&Election::example_local()).await.unwrap();
        store
            .save_ballot(&Ballot::example("local.foo.2019-05-02", "local.2019-05-02", "foo"))
            .await
            .unwrap();
        assert_ne!(store.digest().await.unwrap(), before);
        store.abort_page().await.unwrap();

        assert_eq!(store.digest().await.unwrap(), before);
        assert!(store.election("local.2019-05-02").await.unwrap().is_none());
    }

    #[rocket::async_test]
    async fn committed_pages_stick() {
        let store = MemoryStore::new();
        store.begin_page().await.unwrap();
        store.save_election(&Election::example_local()).await.unwrap();
        store.commit_page().await.unwrap();
        store.abort_page().await.unwrap();
        assert!(store.election("local.2019-05-02").await.unwrap().is_some());
    }

    #[rocket::async_test]
    async fn duplicate_candidacies_are_rejected() {
        let store = MemoryStore::new();
        let candidacy = Candidacy::example("local.foo.2019-05-02", 7, None);
        store.insert_candidacy(&candidacy).await.unwrap();

        // Same person, post and election on a differently-named ballot.
        let again = Candidacy::example("local.foo.by.2019-05-02", 7, None);
        let err = store.insert_candidacy(&again).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[rocket::async_test]
    async fn deleting_an_election_takes_its_ballots() {
        let store = MemoryStore::new();
        let gone = "local.foo.2019-05-02";
        let kept = "parl.foo.2024-07-04";
        store.save_election(&Election::example_local()).await.unwrap();
        store.save_election(&Election::example_parl()).await.unwrap();
        store
            .save_ballot(&Ballot::example(gone, "local.2019-05-02", "foo"))
            .await
            .unwrap();
        store
            .save_ballot(&Ballot::example(kept, "parl.2024-07-04", "foo"))
            .await
            .unwrap();
        store
            .insert_candidacy(&Candidacy::example(gone, 1, None))
            .await
            .unwrap();

        let slugs = ["local.2019-05-02".to_string()];
        assert_eq!(store.delete_elections(&slugs).await.unwrap(), 1);
        assert!(store.ballot(gone).await.unwrap().is_none());
        assert!(store.candidacies_for_ballot(gone).await.unwrap().is_empty());
        assert!(store.ballot(kept).await.unwrap().is_some());
        assert!(store.election("parl.2024-07-04").await.unwrap().is_some());
    }

    #[rocket::async_test]
    async fn deleting_ballots_cascades_to_candidacies() {
        let store = MemoryStore::new();
        let id = "local.foo.2019-05-02";
        store
            .save_ballot(&Ballot::example(id, "local.2019-05-02", "foo"))
            .await
            .unwrap();
        store
            .insert_candidacy(&Candidacy::example(id, 1, Some(10)))
            .await
            .unwrap();

        assert_eq!(store.delete_ballots(&[id.to_string()]).await.unwrap(), 1);
        assert!(store.candidacies_for_ballot(id).await.unwrap().is_empty());
        assert_eq!(store.delete_ballots(&[id.to_string()]).await.unwrap(), 0);
    }

    #[rocket::async_test]
    async fn orphan_posts_are_swept() {
        let store = MemoryStore::new();
        store
            .save_post(&Post::new("shared".to_string(), "Shared".to_string()))
            .await
            .unwrap();
        store
            .save_post(&Post::new("lonely".to_string(), "Lonely".to_string()))
            .await
            .unwrap();
        store
            .save_ballot(&Ballot::example("local.a.2024-05-02", "local.2024-05-02", "shared"))
            .await
            .unwrap();
        store
            .save_ballot(&Ballot::example("local.b.2024-05-02", "local.2024-05-02", "shared"))
            .await
            .unwrap();
        store
            .save_ballot(&Ballot::example("local.c.2024-05-02", "local.2024-05-02", "lonely"))
            .await
            .unwrap();

        // Not the last reference: the post stays.
        store
            .delete_ballots(&["local.a.2024-05-02".to_string()])
            .await
            .unwrap();
        assert_eq!(store.delete_orphan_posts().await.unwrap(), 0);
        assert!(store.post("shared").await.unwrap().is_some());

        // The last reference: the post goes.
        store
            .delete_ballots(&["local.c.2024-05-02".to_string()])
            .await
            .unwrap();
        assert_eq!(store.delete_orphan_posts().await.unwrap(), 1);
        assert!(store.post("lonely").await.unwrap().is_none());
        assert!(store.post("shared").await.unwrap().is_some());
    }

    #[rocket::async_test]
    async fn latest_upstream_modified() {
        let store = MemoryStore::new();
        assert!(store.latest_upstream_modified().await.unwrap().is_none());

        let newest = "2024-06-10T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        for (id, modified) in [
            ("local.a.2024-05-02", Some("2024-06-01T00:00:00Z")),
            ("local.b.2024-05-02", Some("2024-06-10T12:00:00Z")),
            ("local.c.2024-05-02", None),
        ] {
            let mut ballot = Ballot::example(id, "local.2024-05-02", "p");
            ballot.upstream_modified = modified.map(|m| {
                mongodb::bson::DateTime::from_chrono(m.parse::<DateTime<Utc>>().unwrap())
            });
            store.save_ballot(&ballot).await.unwrap();
        }
        assert_eq!(store.latest_upstream_modified().await.unwrap(), Some(newest));
    }
}
