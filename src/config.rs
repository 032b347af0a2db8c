use std::sync::Arc;

use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    figment::Figment,
    Build, Rocket,
};
use serde::Deserialize;

use crate::postcode::{PostcodeClient, PostcodeResolver};
use crate::store::{BallotStore, MongoStore};
use crate::sync::fetch::{Fetch, HttpFetcher};

fn default_page_size() -> u32 {
    200
}

fn default_postcode_cache_capacity() -> usize {
    1000
}

fn default_transactions() -> bool {
    true
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. The server keeps it in managed state; the import
/// command reads it from the same figment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // non-secrets
    candidacy_feed_url: String,
    geography_registry_url: String,
    postcode_api_url: String,
    #[serde(default = "default_page_size")]
    page_size: u32,
    #[serde(default = "default_transactions")]
    transactions: bool,
    #[serde(default = "default_postcode_cache_capacity")]
    postcode_cache_capacity: usize,
    // secrets
    #[serde(default)]
    candidacy_feed_api_key: Option<String>,
    #[serde(default)]
    postcode_api_key: Option<String>,
}

impl Config {
    /// Base URL of the candidacy feed, without a trailing slash.
    pub fn candidacy_feed_url(&self) -> &str {
        self.candidacy_feed_url.trim_end_matches('/')
    }

    /// Base URL of the geography registry, without a trailing slash.
    pub fn geography_registry_url(&self) -> &str {
        self.geography_registry_url.trim_end_matches('/')
    }

    /// Base URL of the postcode lookup service, without a trailing slash.
    pub fn postcode_api_url(&self) -> &str {
        self.postcode_api_url.trim_end_matches('/')
    }

    /// Results per page requested from the candidacy feed when filtering.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Run each page of an import in a MongoDB transaction.
    /// Needs a replica set, so standalone servers must turn it off.
    pub fn transactions(&self) -> bool {
        self.transactions
    }

    /// Number of postcode lookups kept in memory.
    pub fn postcode_cache_capacity(&self) -> usize {
        self.postcode_cache_capacity
    }

    pub fn candidacy_feed_api_key(&self) -> Option<&str> {
        non_blank(&self.candidacy_feed_api_key)
    }

    pub fn postcode_api_key(&self) -> Option<&str> {
        non_blank(&self.postcode_api_key)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// The config placed in state by [`ConfigFairing`], which must be attached first.
fn managed_config(rocket: &Rocket<Build>) -> Option<Config> {
    let config = rocket.state::<Config>().cloned();
    if config.is_none() {
        error!("Application config is not loaded");
    }
    config
}

/// Configuration for the database.
#[derive(Debug, Deserialize)]
pub struct DbConfig {
    // secrets
    db_uri: String,
}

impl DbConfig {
    pub fn db_uri(&self) -> &str {
        &self.db_uri
    }
}

/// Connect to the configured database and wrap it in a store.
pub async fn connect_store(figment: &Figment, config: &Config) -> Result<MongoStore, String> {
    let db_config = figment
        .extract::<DbConfig>()
        .map_err(|e| format!("Failed to load database config: {e}"))?;
    MongoStore::connect(
        db_config.db_uri(),
        &get_database_name(),
        config.transactions(),
    )
        .await
        .map_err(|e| format!("Failed to connect to database: {e}"))
}

/// A fairing that connects to MongoDB, makes sure the indexes exist, and
/// places the store in managed state as a `Box<dyn BallotStore>`.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = managed_config(&rocket) else {
            return Err(rocket);
        };
        info!("Connecting to database...");
        let store = match connect_store(rocket.figment(), &config).await {
            Ok(store) => store,
            Err(e) => {
                error!("{e}");
                return Err(rocket);
            }
        };
        info!("...database connection online!");

        let store: Box<dyn BallotStore> = Box::new(store);
        rocket = rocket.manage(store);
        Ok(rocket)
    }
}

/// A fairing that builds the postcode resolver from the application config
/// and places it in managed state.
pub struct ResolverFairing;

#[rocket::async_trait]
impl Fairing for ResolverFairing {
    fn info(&self) -> Info {
        Info {
            name: "Postcode resolver",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let Some(config) = managed_config(&rocket) else {
            return Err(rocket);
        };
        let fetcher: Arc<dyn Fetch> = match HttpFetcher::new() {
            Ok(fetcher) => Arc::new(fetcher),
            Err(e) => {
                error!("{e}");
                return Err(rocket);
            }
        };
        let client = PostcodeClient::new(
            fetcher,
            config.postcode_api_url(),
            config.postcode_api_key(),
        );
        info!(
            "Postcode lookups via {} (cache of {})",
            config.postcode_api_url(),
            config.postcode_cache_capacity()
        );

        rocket = rocket.manage(PostcodeResolver::new(client, config.postcode_cache_capacity()));
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
pub fn get_database_name() -> String {
    "ballot_sync".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}


#[cfg(test)]
mod tests {
    use rocket::figment::providers::{Format, Toml};

    use super::*;

    #[test]
    fn defaults_and_trailing_slashes() {
        let figment = Figment::from(Toml::string(
            r#"
            candidacy_feed_url = "https://candidates.example/"
            geography_registry_url = "https://registry.example"
            postcode_api_url = "https://postcodes.example/"
            candidacy_feed_api_key = ""
            "#,
        ));
        let config = figment.extract::<Config>().unwrap();
        assert_eq!(config.candidacy_feed_url(), "https://candidates.example");
        assert_eq!(config.postcode_api_url(), "https://postcodes.example");
        assert_eq!(config.page_size(), 200);
        assert!(config.transactions());
        assert_eq!(config.postcode_cache_capacity(), 1000);
        assert_eq!(config.candidacy_feed_api_key(), None);
    }
}
