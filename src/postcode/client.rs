use std::sync::Arc;

use log::debug;

use crate::error::{Error, Result};
use crate::model::api::postcode::PostcodeResponse;
use crate::sync::fetch::Fetch;

/// Talks to the postcode lookup service.
pub struct PostcodeClient {
    fetcher: Arc<dyn Fetch>,
    base_url: String,
    api_key: Option<String>,
}

/// Which lookup a request makes. The service signals bad input differently
/// for each.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Lookup<'a> {
    Postcode(&'a str),
    Address(&'a str),
}

impl PostcodeClient {
    pub fn new(fetcher: Arc<dyn Fetch>, base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            fetcher,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    fn url(&self, lookup: Lookup<'_>) -> Result<String> {
        let (kind, id) = match lookup {
            Lookup::Postcode(postcode) => ("postcode", postcode),
            Lookup::Address(address) => ("address", address),
        };
        let bad_base = || Error::validation(format!("Bad postcode service URL {}", self.base_url));

        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| bad_base())?;
        url.path_segments_mut()
            .map_err(|_| bad_base())?
            .pop_if_empty()
            .extend(["api", "v1", kind, id, ""]);
        {
            let mut query = url.query_pairs_mut();
            if let Some(api_key) = &self.api_key {
                query.append_pair("auth_token", api_key);
            }
            query.append_pair("include_current", "1");
        }
        Ok(url.to_string())
    }

    /// Look up a normalised postcode, or one address within it.
    ///
    /// A postcode the service rejects is [`Error::InvalidPostcode`]; an
    /// address it doesn't know is [`Error::UnknownAddress`]. Any other
    /// failure is an upstream error.
    pub async fn lookup(&self, postcode: &str, address: Option<&str>) -> Result<PostcodeResponse> {
        let lookup = match address {
            Some(address) => Lookup::Address(address),
            None => Lookup::Postcode(postcode),
        };
        let url = self.url(lookup)?;
        let response = self.fetcher.get(&url).await?;
        debug!("Postcode service returned {} for {postcode}", response.status);

        match (lookup, response.status) {
            (_, 200..=299) => response.json(&url),
            (Lookup::Postcode(postcode), 400) => Err(Error::InvalidPostcode(postcode.to_string())),
            (Lookup::Address(address), 404) => Err(Error::UnknownAddress(address.to_string())),
            (_, status) => Err(Error::Upstream { url, status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json::json;

    use super::*;
    use crate::sync::fetch::StaticFetcher;

    const POSTCODE_URL: &str = "http://postcodes.test/api/v1/postcode/SW1A1AA/?auth_token=KEY&include_current=1";
    const ADDRESS_URL: &str = "http://postcodes.test/api/v1/address/100023336956/?auth_token=KEY&include_current=1";

    fn client(fetcher: &Arc<StaticFetcher>) -> PostcodeClient {
        PostcodeClient::new(fetcher.clone(), "http://postcodes.test/", Some("KEY"))
    }

    #[rocket::async_test]
    async fn urls() {
        let fetcher = Arc::new(StaticFetcher::new());
        let client = client(&fetcher);
        assert_eq!(client.url(Lookup::Postcode("SW1A1AA")).unwrap(), POSTCODE_URL);
        assert_eq!(client.url(Lookup::Address("100023336956")).unwrap(), ADDRESS_URL);

        let keyless = PostcodeClient::new(fetcher.clone(), "http://postcodes.test", None);
        assert_eq!(
            keyless.url(Lookup::Postcode("SW1A1AA")).unwrap(),
            "http://postcodes.test/api/v1/postcode/SW1A1AA/?include_current=1"
        );
    }

    #[rocket::async_test]
    async fn bad_input_is_distinguished_by_path() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.respond(POSTCODE_URL, 400, r#"{"message": "Could not geocode"}"#);
        fetcher.respond(ADDRESS_URL, 404, r#"{"message": "Address not found"}"#);
        let client = client(&fetcher);

        let err = client.lookup("SW1A1AA", None).await.unwrap_err();
        assert!(matches!(err, Error::InvalidPostcode(postcode) if postcode == "SW1A1AA"));
        let err = client
            .lookup("SW1A1AA", Some("100023336956"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownAddress(address) if address == "100023336956"));
    }

    #[rocket::async_test]
    async fn other_failures_are_upstream_errors() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.respond(POSTCODE_URL, 404, "Not found");
        fetcher.respond(ADDRESS_URL, 400, "Bad request");
        let client = client(&fetcher);

        let err = client.lookup("SW1A1AA", None).await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 404, .. }));
        let err = client
            .lookup("SW1A1AA", Some("100023336956"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 400, .. }));
    }

    #[rocket::async_test]
    async fn decodes_ballots() {
        let fetcher = Arc::new(StaticFetcher::new());
        fetcher.respond_json(
            POSTCODE_URL,
            json!({
                "address_picker": false,
                "addresses": [],
                "dates": [{"date": "2024-07-04", "ballots": [{"ballot_paper_id": "parl.cities-of-london-and-westminster.2024-07-04"}]}],
            }),
        );
        let response = client(&fetcher).lookup("SW1A1AA", None).await.unwrap();
        assert_eq!(
            response.ballot_paper_ids(),
            vec!["parl.cities-of-london-and-westminster.2024-07-04"]
        );
    }
}
