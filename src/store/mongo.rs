use chrono::{DateTime, Utc};
use log::{debug, info};
use mongodb::{
    bson::{doc, Bson, Document},
    options::{FindOneOptions, ReplaceOptions},
    Client, ClientSession, Database,
};
use rocket::{futures::TryStreamExt, tokio::sync::Mutex};
use serde::de::DeserializeOwned;

use super::BallotStore;
use crate::error::{Error, Result};
use crate::model::db::{Ballot, Candidacy, Election, Party, Person, Post};
use crate::model::mongodb::{ensure_indexes_exist, is_duplicate_key_error, Coll};

/// Run a collection operation inside the open page transaction, if there is one.
macro_rules! in_session {
    ($store:expr, $coll:expr, $op:ident / $op_with_session:ident ($($arg:expr),* $(,)?)) => {{
        let mut session = $store.session.lock().await;
        let result = match session.as_mut() {
            Some(session) => $coll.$op_with_session($($arg,)* session).await,
            None => $coll.$op($($arg),*).await,
        };
        result
    }};
}

/// The production store.
///
/// With transactions enabled, each page of an import runs in one
/// multi-document transaction. This needs a replica set.
pub struct MongoStore {
    client: Client,
    db: Database,
    transactions: bool,
    session: Mutex<Option<ClientSession>>,
}

impl MongoStore {
    pub fn new(client: Client, db: Database, transactions: bool) -> Self {
        Self {
            client,
            db,
            transactions,
            session: Mutex::new(None),
        }
    }

    /// Connect, select the database and make sure its indexes exist.
    pub async fn connect(db_uri: &str, db_name: &str, transactions: bool) -> Result<Self> {
        let client = Client::with_uri_str(db_uri).await?;
        let db = client.database(db_name);
        ensure_indexes_exist(&db).await?;
        info!("Connected to database {db_name}");
        Ok(Self::new(client, db, transactions))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn elections(&self) -> Coll<Election> {
        Coll::from_db(&self.db)
    }

    fn posts(&self) -> Coll<Post> {
        Coll::from_db(&self.db)
    }

    fn ballots(&self) -> Coll<Ballot> {
        Coll::from_db(&self.db)
    }

    fn candidacies(&self) -> Coll<Candidacy> {
        Coll::from_db(&self.db)
    }

    fn people(&self) -> Coll<Person> {
        Coll::from_db(&self.db)
    }

    fn parties(&self) -> Coll<Party> {
        Coll::from_db(&self.db)
    }

    async fn find_all<T>(&self, coll: &Coll<T>, filter: Document) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let mut session = self.session.lock().await;
        let found = match session.as_mut() {
            Some(session) => {
                let mut cursor = coll.find_with_session(filter, None, session).await?;
                cursor.stream(session).try_collect::<Vec<T>>().await?
            }
            None => coll.find(filter, None).await?.try_collect::<Vec<T>>().await?,
        };
        Ok(found)
    }

    async fn upsert<T>(&self, coll: &Coll<T>, id: impl Into<Bson>, value: &T) -> Result<()>
    where
        T: serde::Serialize + Send + Sync,
    {
        let upsert = ReplaceOptions::builder().upsert(true).build();
        in_session!(
            self,
            coll,
            replace_one / replace_one_with_session(doc! {"_id": id.into()}, value, upsert)
        )?;
        Ok(())
    }
}

#[rocket::async_trait]
impl BallotStore for MongoStore {
    async fn begin_page(&self) -> Result<()> {
        if !self.transactions {
            return Ok(());
        }
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        *self.session.lock().await = Some(session);
        Ok(())
    }

    async fn commit_page(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        if let Some(mut session) = session {
            session.commit_transaction().await?;
        }
        Ok(())
    }

    async fn abort_page(&self) -> Result<()> {
        let session = self.session.lock().await.take();
        if let Some(mut session) = session {
            debug!("Aborting page transaction");
            session.abort_transaction().await?;
        }
        Ok(())
    }

    async fn election(&self, slug: &str) -> Result<Option<Election>> {
        Ok(in_session!(
            self,
            self.elections(),
            find_one / find_one_with_session(doc! {"_id": slug}, None)
        )?)
    }

    async fn save_election(&self, election: &Election) -> Result<()> {
        self.upsert(&self.elections(), election.slug.as_str(), election)
            .await
    }

    async fn delete_elections(&self, slugs: &[String]) -> Result<u64> {
        let slugs = slugs.to_vec();
        // Ballots and candidacies go with their election.
        in_session!(
            self,
            self.candidacies(),
            delete_many / delete_many_with_session(doc! {"election_slug": {"$in": slugs.clone()}}, None)
        )?;
        in_session!(
            self,
            self.ballots(),
            delete_many / delete_many_with_session(doc! {"election_slug": {"$in": slugs.clone()}}, None)
        )?;
        let result = in_session!(
            self,
            self.elections(),
            delete_many / delete_many_with_session(doc! {"_id": {"$in": slugs}}, None)
        )?;
        Ok(result.deleted_count)
    }

    async fn post(&self, id: &str) -> Result<Option<Post>> {
        Ok(in_session!(
            self,
            self.posts(),
            find_one / find_one_with_session(doc! {"_id": id}, None)
        )?)
    }

    async fn save_post(&self, post: &Post) -> Result<()> {
        self.upsert(&self.posts(), post.id.as_str(), post).await
    }

    async fn delete_orphan_posts(&self) -> Result<u64> {
        let referenced = in_session!(
            self,
            self.ballots(),
            distinct / distinct_with_session("post_id", None, None)
        )?;
        let filter = doc! {"_id": {"$nin": referenced}};
        let result = in_session!(
            self,
            self.posts(),
            delete_many / delete_many_with_session(filter, None)
        )?;
        Ok(result.deleted_count)
    }

    async fn ballot(&self, ballot_paper_id: &str) -> Result<Option<Ballot>> {
        Ok(in_session!(
            self,
            self.ballots(),
            find_one / find_one_with_session(doc! {"_id": ballot_paper_id}, None)
        )?)
    }

    async fn ballots(&self, ballot_paper_ids: &[String]) -> Result<Vec<Ballot>> {
        self.find_all(
            &self.ballots(),
            doc! {"_id": {"$in": ballot_paper_ids.to_vec()}},
        )
        .await
    }

    async fn save_ballot(&self, ballot: &Ballot) -> Result<()> {
        self.upsert(&self.ballots(), ballot.ballot_paper_id.as_str(), ballot)
            .await
    }

    async fn cancelled_ballots(&self) -> Result<Vec<Ballot>> {
        self.find_all(&self.ballots(), doc! {"cancelled": true})
            .await
    }

    async fn delete_ballots(&self, ballot_paper_ids: &[String]) -> Result<u64> {
        let ids = ballot_paper_ids.to_vec();
        in_session!(
            self,
            self.candidacies(),
            delete_many / delete_many_with_session(doc! {"ballot_paper_id": {"$in": ids.clone()}}, None)
        )?;
        let result = in_session!(
            self,
            self.ballots(),
            delete_many / delete_many_with_session(doc! {"_id": {"$in": ids}}, None)
        )?;
        Ok(result.deleted_count)
    }

    async fn latest_upstream_modified(&self) -> Result<Option<DateTime<Utc>>> {
        let newest_first = FindOneOptions::builder()
            .sort(doc! {"upstream_modified": -1})
            .build();
        let ballot = in_session!(
            self,
            self.ballots(),
            find_one / find_one_with_session(doc! {"upstream_modified": {"$ne": null}}, newest_first)
        )?;
        Ok(ballot
            .and_then(|ballot| ballot.upstream_modified)
            .map(|modified| modified.to_chrono()))
    }

    async fn candidacies_for_ballot(&self, ballot_paper_id: &str) -> Result<Vec<Candidacy>> {
        self.find_all(
            &self.candidacies(),
            doc! {"ballot_paper_id": ballot_paper_id},
        )
        .await
    }

    async fn insert_candidacy(&self, candidacy: &Candidacy) -> Result<()> {
        let result = in_session!(
            self,
            self.candidacies(),
            insert_one / insert_one_with_session(candidacy, None)
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key_error(&e) => Err(Error::validation(format!(
                "Duplicate candidacy for person {} on {}",
                candidacy.person_id, candidacy.ballot_paper_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_candidacies_for_ballot(&self, ballot_paper_id: &str) -> Result<u64> {
        let result = in_session!(
            self,
            self.candidacies(),
            delete_many / delete_many_with_session(doc! {"ballot_paper_id": ballot_paper_id}, None)
        )?;
        Ok(result.deleted_count)
    }

    async fn set_ranks(&self, ballot_paper_id: &str, ranks: &[(String, Option<u32>)]) -> Result<()> {
        let candidacies = self.candidacies();
        for (id, rank) in ranks {
            let filter = doc! {"_id": id.as_str(), "ballot_paper_id": ballot_paper_id};
            let update = doc! {"$set": {"rank": rank.map(i64::from)}};
            in_session!(
                self,
                candidacies,
                update_one / update_one_with_session(filter, update, None)
            )?;
        }
        Ok(())
    }

    async fn save_person(&self, person: &Person) -> Result<()> {
        self.upsert(&self.people(), person.id, person).await
    }

    async fn party(&self, id: &str) -> Result<Option<Party>> {
        Ok(in_session!(
            self,
            self.parties(),
            find_one / find_one_with_session(doc! {"_id": id}, None)
        )?)
    }
}
