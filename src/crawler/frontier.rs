//! Shared crawl frontier
//!
//! Workers pull targets from one queue. A worker that finds the queue empty
//! waits while other workers are still processing, since their pages may
//! yield new links; once nothing is queued and nothing is in flight, every
//! waiting worker is released.
//!
//! Children are pushed to the front in document order, so the crawl runs
//! depth-first from each search result.

use crate::context::RunContext;
use crate::state::CrawlTarget;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<CrawlTarget>,
    in_flight: usize,
}

/// Work queue shared by all crawl workers
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    changed: Notify,
}

impl Frontier {
    pub fn new(targets: impl IntoIterator<Item = CrawlTarget>) -> Self {
        Self {
            inner: Mutex::new(FrontierInner {
                queue: targets.into_iter().collect(),
                in_flight: 0,
            }),
            changed: Notify::new(),
        }
    }

    /// Takes the next target, waiting while other workers may still add some
    ///
    /// Returns `None` when the crawl is finished or cancelled. Every target
    /// returned must be handed back through [`Frontier::complete`] or
    /// [`Frontier::requeue`].
    pub async fn next(&self, ctx: &RunContext) -> Option<CrawlTarget> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut inner = self.inner.lock().unwrap();
                if ctx.is_cancelled() {
                    return None;
                }
                if let Some(target) = inner.queue.pop_front() {
                    inner.in_flight += 1;
                    return Some(target);
                }
                if inner.in_flight == 0 {
                    drop(inner);
                    self.changed.notify_waiters();
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Marks a target as processed and queues the links found on it
    pub fn complete(&self, children: Vec<CrawlTarget>) {
        {
            let mut inner = self.inner.lock().unwrap();
            for child in children.into_iter().rev() {
                inner.queue.push_front(child);
            }
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Returns an unprocessed target to the head of the queue
    pub fn requeue(&self, target: CrawlTarget) {
        self.complete(vec![target]);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queued targets in processing order
    pub fn remaining(&self) -> Vec<CrawlTarget> {
        self.inner.lock().unwrap().queue.iter().cloned().collect()
    }
}
