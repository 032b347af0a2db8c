use std::collections::HashMap;

use crate::error::Result;
use crate::model::{api::feed::PostRef, db::Post};
use crate::store::BallotStore;

/// Creates and relabels posts from the candidacy feed, once per key per run.
#[derive(Debug, Default)]
pub struct PostImporter {
    seen: HashMap<String, Post>,
}

impl PostImporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a post, keeping whatever registry data it already carries.
    /// `None` if the record has neither an ID nor a slug.
    pub async fn upsert(&mut self, store: &dyn BallotStore, record: &PostRef) -> Result<Option<Post>> {
        let key = match record.key() {
            Some(key) => key,
            None => return Ok(None),
        };
        if let Some(post) = self.seen.get(key) {
            return Ok(Some(post.clone()));
        }

        let post = match store.post(key).await? {
            Some(mut existing) => {
                existing.label = record.label.clone();
                existing
            }
            None => Post::new(key.to_string(), record.label.clone()),
        };
        store.save_post(&post).await?;
        self.seen.insert(key.to_string(), post.clone());
        Ok(Some(post))
    }

    /// Keep the memo in step after the post has been enriched and saved.
    pub fn remember(&mut self, post: &Post) {
        if let Some(seen) = self.seen.get_mut(&post.id) {
            *seen = post.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn post_ref(id: Option<&str>, slug: Option<&str>, label: &str) -> PostRef {
        PostRef {
            id: id.map(str::to_string),
            slug: slug.map(str::to_string),
            label: label.to_string(),
        }
    }

    #[rocket::async_test]
    async fn no_key_no_post() {
        let store = MemoryStore::new();
        let mut importer = PostImporter::new();
        let post = importer
            .upsert(&store, &post_ref(None, Some(""), "Nowhere"))
            .await
            .unwrap();
        assert!(post.is_none());
        assert_eq!(store.counts().await.posts, 0);
    }

    #[rocket::async_test]
    async fn relabels_without_losing_enrichment() {
        let store = MemoryStore::new();
        let mut existing = Post::new("gss:E05000001".to_string(), "Old label".to_string());
        existing.territory = Some("ENG".to_string());
        store.save_post(&existing).await.unwrap();

        let mut importer = PostImporter::new();
        let post = importer
            .upsert(&store, &post_ref(Some("gss:E05000001"), None, "New label"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.label, "New label");
        assert_eq!(post.territory.as_deref(), Some("ENG"));
    }

    #[rocket::async_test]
    async fn slug_is_the_fallback_key() {
        let store = MemoryStore::new();
        let mut importer = PostImporter::new();
        let post = importer
            .upsert(&store, &post_ref(None, Some("temp-ward"), "Temporary"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(post.id, "temp-ward");
        assert!(store.post("temp-ward").await.unwrap().is_some());
    }
}
