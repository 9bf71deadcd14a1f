//! Visited/dedup registry shared by all crawl workers

use std::collections::HashSet;
use std::sync::Mutex;

/// Thread-safe set of claimed URLs
///
/// A URL can be claimed exactly once: the membership check and the insert
/// happen under one lock, so two workers can never both see it unclaimed.
#[derive(Debug, Default)]
pub struct VisitedRegistry {
    claimed: Mutex<HashSet<String>>,
}

impl VisitedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated from a persisted visited set
    pub fn seeded<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            claimed: Mutex::new(urls.into_iter().map(Into::into).collect()),
        }
    }

    /// Claims `url`, returning false when it was already claimed
    pub fn try_claim(&self, url: &str) -> bool {
        let mut claimed = self.claimed.lock().unwrap();
        if claimed.contains(url) {
            return false;
        }
        claimed.insert(url.to_string())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.claimed.lock().unwrap().contains(url)
    }

    pub fn len(&self) -> usize {
        self.claimed.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted copy of every claimed URL, for persistence
    pub fn snapshot(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.claimed.lock().unwrap().iter().cloned().collect();
        urls.sort();
        urls
    }
}
