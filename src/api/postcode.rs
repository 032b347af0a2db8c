use chrono::Utc;
use log::warn;
use rocket::{http::RawStr, response::Redirect, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::api::postcode::PostcodeView;
use crate::postcode::{normalise_postcode, PostcodeResolver};
use crate::store::BallotStore;

pub fn routes() -> Vec<Route> {
    routes![postcode]
}

#[derive(Responder)]
enum PostcodeReply {
    View(Json<PostcodeView>),
    Correction(Redirect),
}

/// Where to send someone whose postcode the lookup service rejected.
fn correction_uri(postcode: &str) -> String {
    format!(
        "/?invalid_postcode=1&postcode={}",
        RawStr::new(postcode).percent_encode().as_str()
    )
}

#[get("/postcode/<postcode>?<address>")]
async fn postcode(
    postcode: &str,
    address: Option<&str>,
    store: &State<Box<dyn BallotStore>>,
    resolver: &State<PostcodeResolver>,
) -> Result<PostcodeReply> {
    let today = Utc::now().date_naive();
    match resolver
        .resolve(store.inner().as_ref(), postcode, address, today)
        .await
    {
        Ok(view) => Ok(PostcodeReply::View(Json(view))),
        Err(Error::InvalidPostcode(_)) => {
            Ok(PostcodeReply::Correction(Redirect::to(correction_uri(postcode))))
        }
        Err(e @ Error::UnknownAddress(_)) => Err(e),
        Err(e) => {
            // Render without ballot information rather than failing the page.
            warn!("Postcode lookup for {postcode} failed: {e}");
            Ok(PostcodeReply::View(Json(PostcodeView::Unavailable {
                postcode: normalise_postcode(postcode),
            })))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::{
        http::Status,
        local::asynchronous::Client,
        serde::json::{serde_json, serde_json::json},
    };

    use super::*;
    use crate::model::db::{Ballot, Election};
    use crate::postcode::PostcodeClient;
    use crate::store::MemoryStore;
    use crate::sync::fetch::StaticFetcher;

    const SERVICE: &str = "http://postcodes.test";

    async fn client(store: MemoryStore, fetcher: &Arc<StaticFetcher>) -> Client {
        let resolver = PostcodeResolver::new(PostcodeClient::new(fetcher.clone(), SERVICE, None), 8);
        Client::tracked(crate::rocket_with(store, resolver))
            .await
            .unwrap()
    }

    fn lookup_url(postcode: &str) -> String {
        format!("{SERVICE}/api/v1/postcode/{postcode}/?include_current=1")
    }

    #[rocket::async_test]
    async fn ballots_for_a_postcode() {
        let store = MemoryStore::new();
        store.save_election(&Election::example_parl()).await.unwrap();
        let id = "parl.cities-of-london-and-westminster.2024-07-04";
        store
            .save_ballot(&Ballot::example(id, "parl.2024-07-04", "cities-of-london-and-westminster"))
            .await
            .unwrap();
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.respond_json(
            lookup_url("SW1A1AA"),
            json!({
                "address_picker": false,
                "dates": [{"date": "2024-07-04", "ballots": [{"ballot_paper_id": id}]}],
            }),
        );
        let client = client(store, &fetcher).await;

        let response = client.get("/postcode/sw1a%201aa").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let body: serde_json::Value =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(body["kind"], "ballots");
        assert_eq!(body["postcode"], "SW1A1AA");
        assert_eq!(body["ballots"][0]["ballot_paper_id"], id);
    }

    #[rocket::async_test]
    async fn invalid_postcodes_redirect_for_correction() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.respond(lookup_url("ZZ99ZZ"), 400, "{}");
        let client = client(MemoryStore::new(), &fetcher).await;

        let response = client.get("/postcode/ZZ99ZZ").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(
            response.headers().get_one("Location"),
            Some("/?invalid_postcode=1&postcode=ZZ99ZZ")
        );
    }

    #[rocket::async_test]
    async fn unknown_addresses_are_not_found() {
        let fetcher = Arc::new(StaticFetcher::new());
        let client = client(MemoryStore::new(), &fetcher).await;

        // Nothing registered, so the address lookup 404s.
        let response = client.get("/postcode/SW1A1AA?address=999").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn other_failures_degrade() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.respond(lookup_url("SW1A1AA"), 503, "Service Unavailable");
        let client = client(MemoryStore::new(), &fetcher).await;

        let response = client.get("/postcode/SW1A1AA").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let view: PostcodeView =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(
            view,
            PostcodeView::Unavailable {
                postcode: "SW1A1AA".to_string()
            }
        );
    }
}
