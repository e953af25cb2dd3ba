use std::collections::VecDeque;

use dashmap::DashSet;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

/// FIFO queue of pages waiting to be crawled.
///
/// URLs are deduplicated on their normalized form (one trailing `/` removed) for the whole
/// lifetime of the frontier, dequeuing does not make a URL eligible again. The queue keeps
/// the URL as it was first discovered.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: Mutex<Queue>,
    queued: DashSet<String>,
}

#[derive(Debug, Default)]
struct Queue {
    urls: VecDeque<String>,
    total: usize,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `url` unless its normalized form was already enqueued, returns whether it was.
    pub fn enqueue(&self, url: &str) -> bool {
        if !self.queued.insert(dedup_key(url)) {
            return false;
        }
        let mut queue = self.queue.lock();
        queue.urls.push_back(url.to_string());
        queue.total += 1;
        true
    }

    /// Pops the oldest URL, never waits.
    pub fn dequeue(&self) -> Option<String> {
        self.queue.lock().urls.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().urls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().urls.len()
    }

    /// Number of URLs ever appended.
    pub fn total_enqueued(&self) -> usize {
        self.queue.lock().total
    }
}

pub(crate) fn normalize(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

fn dedup_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(url).as_bytes());
    format!("{:x}", hasher.finalize())
}
