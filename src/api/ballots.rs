use rocket::{serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::api::ballot::BallotDescription;
use crate::store::BallotStore;

pub fn routes() -> Vec<Route> {
    routes![ballot]
}

#[get("/ballots/<ballot_paper_id>")]
async fn ballot(
    ballot_paper_id: &str,
    store: &State<Box<dyn BallotStore>>,
) -> Result<Json<BallotDescription>> {
    let store = store.inner().as_ref();
    let ballot = store
        .ballot(ballot_paper_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Ballot '{ballot_paper_id}'")))?;
    let election = store
        .election(&ballot.election_slug)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election '{}'", ballot.election_slug)))?;
    let candidacies = store.candidacies_for_ballot(ballot_paper_id).await?;

    Ok(Json(BallotDescription::new(ballot, &election, candidacies)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::{http::Status, local::asynchronous::Client, serde::json::serde_json};

    use super::*;
    use crate::model::db::{Ballot, Candidacy, Election};
    use crate::postcode::{PostcodeClient, PostcodeResolver};
    use crate::ranking::rank_ballot;
    use crate::store::MemoryStore;
    use crate::sync::fetch::StaticFetcher;

    const BALLOT: &str = "local.foo.2019-05-02";

    async fn client(store: MemoryStore) -> Client {
        let resolver = PostcodeResolver::new(
            PostcodeClient::new(Arc::new(StaticFetcher::new()), "http://postcodes.test", None),
            8,
        );
        Client::tracked(crate::rocket_with(store, resolver))
            .await
            .unwrap()
    }

    #[rocket::async_test]
    async fn ballot_with_rank_labels() {
        let store = MemoryStore::new();
        store.save_election(&Election::example_local()).await.unwrap();
        store
            .save_ballot(&Ballot::example(BALLOT, "local.2019-05-02", "gss:E05000001"))
            .await
            .unwrap();
        for (person_id, votes) in [(1, 100), (2, 200), (3, 300), (4, 200)] {
            store
                .insert_candidacy(&Candidacy::example(BALLOT, person_id, Some(votes)))
                .await
                .unwrap();
        }
        assert!(rank_ballot(&store, BALLOT).await.unwrap());
        let client = client(store).await;

        let response = client.get(uri!(ballot(BALLOT))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let description: BallotDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();

        assert_eq!(description.summary.election_name, "Local elections");
        let labels: Vec<(i64, Option<&str>)> = description
            .candidacies
            .iter()
            .map(|c| (c.person_id, c.rank_label.as_deref()))
            .collect();
        assert_eq!(
            labels,
            vec![
                (3, Some("1st / 4 candidates")),
                (2, Some("Joint 2nd / 4 candidates")),
                (4, Some("Joint 2nd / 4 candidates")),
                (1, Some("4th / 4 candidates")),
            ]
        );
    }

    #[rocket::async_test]
    async fn unknown_ballot() {
        let client = client(MemoryStore::new()).await;
        let response = client.get(uri!(ballot("parl.nowhere.2024-07-04"))).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
