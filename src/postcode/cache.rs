use std::collections::{HashMap, VecDeque};

use rocket::tokio::sync::Mutex;

use crate::model::api::postcode::PostcodeResponse;

#[derive(Debug, Default)]
struct Entries {
    values: HashMap<String, PostcodeResponse>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<String>,
}

/// Raw postcode service responses, shared between requests.
///
/// Entries never expire; once full, the oldest entry makes way for the
/// newest. Concurrent writers to the same key are harmless: the values are
/// equivalent and the last one wins.
#[derive(Debug)]
pub struct PostcodeCache {
    capacity: usize,
    entries: Mutex<Entries>,
}

impl PostcodeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(Entries::default()),
        }
    }

    pub async fn get(&self, key: &str) -> Option<PostcodeResponse> {
        self.entries.lock().await.values.get(key).cloned()
    }

    pub async fn insert(&self, key: String, value: PostcodeResponse) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().await;
        if entries.values.insert(key.clone(), value).is_some() {
            return;
        }
        entries.order.push_back(key);
        while entries.order.len() > self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.values.remove(&oldest);
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(n: usize) -> PostcodeResponse {
        PostcodeResponse {
            address_picker: false,
            addresses: Vec::new(),
            dates: Vec::new(),
            electoral_services: Some(n.into()),
            registration: None,
        }
    }

    #[rocket::async_test]
    async fn oldest_entry_is_evicted() {
        let cache = PostcodeCache::new(2);
        cache.insert("A".to_string(), response(1)).await;
        cache.insert("B".to_string(), response(2)).await;
        // Overwriting doesn't refresh the entry's position.
        cache.insert("A".to_string(), response(3)).await;
        cache.insert("C".to_string(), response(4)).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("A").await.is_none());
        assert_eq!(cache.get("B").await, Some(response(2)));
        assert_eq!(cache.get("C").await, Some(response(4)));
    }

    #[rocket::async_test]
    async fn zero_capacity_caches_nothing() {
        let cache = PostcodeCache::new(0);
        cache.insert("A".to_string(), response(1)).await;
        assert!(cache.get("A").await.is_none());
    }
}
