use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, info, warn};
use rocket::serde::json::{serde_json, Value};

use crate::error::Result;
use crate::model::api::geography::GeographyRecord;
use crate::sync::{fetch::Fetch, paginator::Paginator};

/// How far back polling days are checked when looking for deleted elections.
pub const DELETED_WINDOW_DAYS: i64 = 50;

/// How far back modifications are considered "recent".
pub const RECENTLY_MODIFIED_HOURS: i64 = 1;

/// Run-scoped memo of geography registry records, keyed by election ID.
///
/// A `None` entry means the registry has nothing for that ID, so it is not
/// asked again during this run.
pub struct MetadataCache {
    fetcher: Arc<dyn Fetch>,
    elections_url: String,
    records: HashMap<String, Option<Arc<GeographyRecord>>>,
}

impl MetadataCache {
    pub fn new(fetcher: Arc<dyn Fetch>, registry_base: &str) -> Self {
        Self {
            fetcher,
            elections_url: format!("{}/api/elections/", registry_base.trim_end_matches('/')),
            records: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bulk-load every registry record, or only current ones.
    pub async fn prewarm(&mut self, current: bool, sink: &mut (dyn Write + Send)) -> Result<usize> {
        let mut url = self.elections_url.clone();
        if current {
            url.push_str("?current=True");
        }

        let mut pages = Paginator::<Value>::new(self.fetcher.clone(), url, sink);
        let mut loaded = 0;
        while let Some(results) = pages.next_page().await? {
            for result in results {
                if let Some(record) = decode(result) {
                    self.insert(record);
                    loaded += 1;
                }
            }
        }
        info!("Prewarmed metadata cache with {loaded} records");
        Ok(loaded)
    }

    /// Look up one record, asking the registry on a miss.
    pub async fn get(&mut self, election_id: &str) -> Result<Option<Arc<GeographyRecord>>> {
        if let Some(cached) = self.records.get(election_id) {
            return Ok(cached.clone());
        }

        let url = format!("{}{election_id}/", self.elections_url);
        let response = self.fetcher.get(&url).await?;
        let record = if response.status == 200 {
            match response.json::<GeographyRecord>(&url) {
                Ok(record) => Some(Arc::new(record)),
                Err(e) => {
                    warn!("Ignoring registry record for {election_id}: {e}");
                    None
                }
            }
        } else {
            debug!("No registry record for {election_id} ({})", response.status);
            None
        };
        self.records.insert(election_id.to_string(), record.clone());
        Ok(record)
    }

    /// Seed the cache with a known record.
    pub fn insert(&mut self, record: GeographyRecord) {
        self.records
            .insert(record.election_id.clone(), Some(Arc::new(record)));
    }

    /// IDs soft-deleted upstream whose polling day is within the trailing window.
    pub async fn deleted_ids(
        &self,
        today: NaiveDate,
        sink: &mut (dyn Write + Send),
    ) -> Result<Vec<String>> {
        let since = today - Duration::days(DELETED_WINDOW_DAYS);
        let url = format!(
            "{}?deleted=1&poll_open_date__gte={}",
            self.elections_url,
            since.format("%Y-%m-%d")
        );
        let results = Paginator::<Value>::new(self.fetcher.clone(), url, sink)
            .collect_all()
            .await?;
        Ok(results
            .iter()
            .filter_map(|result| result.get("election_id")?.as_str())
            .map(str::to_string)
            .collect())
    }

    /// Lazily walk records modified within the trailing window.
    pub fn recently_modified<'a>(
        &self,
        now: DateTime<Utc>,
        sink: &'a mut (dyn Write + Send),
    ) -> RecentlyModified<'a> {
        let since = now - Duration::hours(RECENTLY_MODIFIED_HOURS);
        let url = format!(
            "{}?modified={}",
            self.elections_url,
            since.format("%Y-%m-%dT%H:%M:%SZ")
        );
        RecentlyModified {
            pages: Paginator::new(self.fetcher.clone(), url, sink),
            pending: VecDeque::new(),
        }
    }
}

/// Election IDs recently modified in the registry, fetched a page at a time.
///
/// Every record seen is added to the cache. Election group records without
/// children are not yielded. Groups with children are, so the caller can
/// fan out to the ballots under them.
pub struct RecentlyModified<'a> {
    pages: Paginator<'a, Value>,
    pending: VecDeque<String>,
}

impl<'a> RecentlyModified<'a> {
    pub async fn next(&mut self, cache: &mut MetadataCache) -> Result<Option<String>> {
        loop {
            if let Some(id) = self.pending.pop_front() {
                return Ok(Some(id));
            }
            let results = match self.pages.next_page().await? {
                Some(results) => results,
                None => return Ok(None),
            };
            for result in results {
                let record = match decode(result) {
                    Some(record) => record,
                    None => continue,
                };
                let skip = record.is_election_group() && record.children.is_empty();
                let id = record.election_id.clone();
                cache.insert(record);
                if skip {
                    debug!("Skipping childless group {id}");
                } else {
                    self.pending.push_back(id);
                }
            }
        }
    }
}

fn decode(result: Value) -> Option<GeographyRecord> {
    match serde_json::from_value::<GeographyRecord>(result) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!("Skipping malformed registry record: {e}");
            None
        }
    }
}
