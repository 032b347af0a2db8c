use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{Ballot, Candidacy, Election, Party, Person, Post};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Election {
    const NAME: &'static str = "elections";
}

impl MongoCollection for Post {
    const NAME: &'static str = "posts";
}

impl MongoCollection for Ballot {
    const NAME: &'static str = "ballots";
}

impl MongoCollection for Candidacy {
    const NAME: &'static str = "candidacies";
}

impl MongoCollection for Person {
    const NAME: &'static str = "people";
}

impl MongoCollection for Party {
    const NAME: &'static str = "parties";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // One candidacy per person per post per election.
    let candidacy_index = IndexModel::builder()
        .keys(doc! {"person_id": 1, "post_id": 1, "election_slug": 1})
        .options(unique)
        .build();
    let by_ballot = IndexModel::builder()
        .keys(doc! {"ballot_paper_id": 1})
        .build();
    Coll::<Candidacy>::from_db(db)
        .create_indexes([candidacy_index, by_ballot], None)
        .await?;

    // Ballots are looked up by post for the orphan sweep.
    let post_index = IndexModel::builder().keys(doc! {"post_id": 1}).build();
    let modified_index = IndexModel::builder()
        .keys(doc! {"upstream_modified": -1})
        .build();
    let cancelled_index = IndexModel::builder().keys(doc! {"cancelled": 1}).build();
    Coll::<Ballot>::from_db(db)
        .create_indexes([post_index, modified_index, cancelled_index], None)
        .await?;

    Ok(())
}
