use std::io::Write;
use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, error};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::model::api::feed::Page;
use crate::sync::fetch::Fetch;

/// Walks a cursor-paginated listing one page at a time.
///
/// Each URL is written to `sink` before it is fetched. Once the listing is
/// exhausted, or a page fails, the paginator yields nothing more.
pub struct Paginator<'a, T> {
    fetcher: Arc<dyn Fetch>,
    sink: &'a mut (dyn Write + Send),
    next: Option<String>,
    _results: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned> Paginator<'a, T> {
    pub fn new(
        fetcher: Arc<dyn Fetch>,
        first_page: impl Into<String>,
        sink: &'a mut (dyn Write + Send),
    ) -> Self {
        Self {
            fetcher,
            sink,
            next: Some(first_page.into()),
            _results: PhantomData,
        }
    }

    /// Fetch the next page, or `None` if there are no more.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>> {
        let url = match self.next.take() {
            Some(url) => url,
            None => return Ok(None),
        };
        writeln!(self.sink, "{url}")?;

        let response = self.fetcher.get(&url).await?;
        if !response.is_success() {
            error!("{url} returned {}: {}", response.status, response.body);
            writeln!(self.sink, "crashing with response:")?;
            writeln!(self.sink, "{}", response.body)?;
            return Err(Error::Upstream {
                url,
                status: response.status,
            });
        }

        let page: Page<T> = response.json(&url)?;
        debug!("{} results from {url}", page.results.len());
        self.next = page.next.filter(|next| !next.is_empty());
        Ok(Some(page.results))
    }

    /// Read every remaining page, concatenating the results.
    pub async fn collect_all(mut self) -> Result<Vec<T>> {
        let mut all = Vec::new();
        while let Some(results) = self.next_page().await? {
            all.extend(results);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::{serde_json::json, Value};

    use super::*;
    use crate::sync::fetch::StaticFetcher;

    fn fetcher() -> Arc<StaticFetcher> {
        Arc::new(StaticFetcher::new())
    }

    #[rocket::async_test]
    async fn follows_next_until_null() {
        let fetcher = fetcher();
        fetcher.respond_json(
            "http://feed/1",
            json!({"results": [1, 2], "next": "http://feed/2"}),
        );
        fetcher.respond_json("http://feed/2", json!({"results": [3], "next": null}));

        let mut sink = Vec::new();
        let results = Paginator::<u32>::new(fetcher.clone(), "http://feed/1", &mut sink)
            .collect_all()
            .await
            .unwrap();
        assert_eq!(results, vec![1, 2, 3]);
        assert_eq!(String::from_utf8(sink).unwrap(), "http://feed/1\nhttp://feed/2\n");
    }

    #[rocket::async_test]
    async fn missing_next_ends_the_walk() {
        let fetcher = fetcher();
        fetcher.respond_json("http://feed/1", json!({"results": [{"a": 1}]}));

        let mut sink = Vec::new();
        let mut pages = Paginator::<Value>::new(fetcher.clone(), "http://feed/1", &mut sink);
        assert_eq!(pages.next_page().await.unwrap().unwrap().len(), 1);
        assert!(pages.next_page().await.unwrap().is_none());
        assert!(pages.next_page().await.unwrap().is_none());
        assert_eq!(fetcher.request_count("http://feed/1"), 1);
    }

    #[rocket::async_test]
    async fn non_success_is_fatal_and_logged_to_sink() {
        let fetcher = fetcher();
        fetcher.respond_json(
            "http://feed/1",
            json!({"results": [1], "next": "http://feed/2"}),
        );
        fetcher.respond("http://feed/2", 502, "bad gateway");

        let mut sink = Vec::new();
        let mut pages = Paginator::<u32>::new(fetcher.clone(), "http://feed/1", &mut sink);
        assert!(pages.next_page().await.unwrap().is_some());
        let err = pages.next_page().await.unwrap_err();
        assert!(matches!(err, Error::Upstream { status: 502, .. }));
        // Not restartable.
        assert!(pages.next_page().await.unwrap().is_none());
        drop(pages);

        let output = String::from_utf8(sink).unwrap();
        assert!(output.contains("crashing with response:"));
        assert!(output.contains("bad gateway"));
    }

    #[rocket::async_test]
    async fn transport_errors_propagate() {
        let fetcher = fetcher();
        fetcher.unreachable("http://feed/1");

        let mut sink = Vec::new();
        let err = Paginator::<u32>::new(fetcher.clone(), "http://feed/1", &mut sink)
            .collect_all()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Fetch(_)));
    }
}
