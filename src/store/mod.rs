//! The local canonical store that imports write into and requests read from.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::db::{Ballot, Candidacy, Election, Party, Person, Post};

/// Persistent storage for elections, posts, ballots and candidacies.
///
/// Writes made between [`BallotStore::begin_page`] and
/// [`BallotStore::commit_page`] are applied together; [`BallotStore::abort_page`]
/// discards them. Outside a page, writes apply immediately.
#[rocket::async_trait]
pub trait BallotStore: Send + Sync {
    async fn begin_page(&self) -> Result<()>;
    async fn commit_page(&self) -> Result<()>;
    async fn abort_page(&self) -> Result<()>;

    async fn election(&self, slug: &str) -> Result<Option<Election>>;
    async fn save_election(&self, election: &Election) -> Result<()>;
    /// Delete elections by slug, with their ballots and candidacies, returning
    /// how many elections existed.
    async fn delete_elections(&self, slugs: &[String]) -> Result<u64>;

    async fn post(&self, id: &str) -> Result<Option<Post>>;
    async fn save_post(&self, post: &Post) -> Result<()>;
    /// Delete every post no ballot refers to, returning how many went.
    async fn delete_orphan_posts(&self) -> Result<u64>;

    async fn ballot(&self, ballot_paper_id: &str) -> Result<Option<Ballot>>;
    /// The ballots that exist among `ballot_paper_ids`, in no particular order.
    async fn ballots(&self, ballot_paper_ids: &[String]) -> Result<Vec<Ballot>>;
    async fn save_ballot(&self, ballot: &Ballot) -> Result<()>;
    async fn cancelled_ballots(&self) -> Result<Vec<Ballot>>;
    /// Delete ballots, and their candidacies, by paper ID.
    async fn delete_ballots(&self, ballot_paper_ids: &[String]) -> Result<u64>;
    /// The most recent upstream modification time of any ballot.
    async fn latest_upstream_modified(&self) -> Result<Option<DateTime<Utc>>>;

    async fn candidacies_for_ballot(&self, ballot_paper_id: &str) -> Result<Vec<Candidacy>>;
    /// Insert a new candidacy. A second candidacy for the same person, post
    /// and election is a validation error.
    async fn insert_candidacy(&self, candidacy: &Candidacy) -> Result<()>;
    async fn delete_candidacies_for_ballot(&self, ballot_paper_id: &str) -> Result<u64>;
    /// Overwrite the rank of each listed candidacy on one ballot.
    async fn set_ranks(&self, ballot_paper_id: &str, ranks: &[(String, Option<u32>)]) -> Result<()>;

    async fn save_person(&self, person: &Person) -> Result<()>;
    async fn party(&self, id: &str) -> Result<Option<Party>>;
}
