//! Run summaries
//!
//! Counters collected while a run is in progress and printed when it ends.

use crate::state::TargetState;
use std::collections::HashMap;
use std::sync::Mutex;

/// Final counts of one crawl run
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    /// Number of targets per terminal state
    pub by_state: HashMap<TargetState, u64>,

    /// URLs returned by the search phase
    pub search_results: usize,

    /// Total URLs in the visited set at the end of the run
    pub total_visited: usize,

    /// Targets left in the frontier
    pub remaining: usize,

    /// Whether the run stopped because of cancellation
    pub cancelled: bool,
}

impl CrawlSummary {
    pub fn count(&self, state: TargetState) -> u64 {
        self.by_state.get(&state).copied().unwrap_or(0)
    }

    /// Returns the total number of targets that reached a terminal state
    pub fn total_terminal(&self) -> u64 {
        self.by_state.values().sum()
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        let terminal = self.total_terminal();
        if terminal == 0 {
            return 0.0;
        }
        let succeeded: u64 = self
            .by_state
            .iter()
            .filter(|(state, _)| state.is_success())
            .map(|(_, count)| count)
            .sum();
        (succeeded as f64 / terminal as f64) * 100.0
    }
}

/// Thread-safe tally of terminal target states
#[derive(Debug, Default)]
pub struct StateTally {
    counts: Mutex<HashMap<TargetState, u64>>,
}

impl StateTally {
    pub fn record(&self, state: TargetState) {
        *self.counts.lock().unwrap().entry(state).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> HashMap<TargetState, u64> {
        self.counts.lock().unwrap().clone()
    }
}

/// Prints a crawl summary to stdout
pub fn print_crawl_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");
    println!("  Search results: {}", summary.search_results);
    println!("  Visited URLs: {}", summary.total_visited);
    println!("  Remaining in frontier: {}", summary.remaining);
    if summary.cancelled {
        println!("  Run was cancelled; resume with --resume");
    }
    println!();

    println!("Targets by State:");
    for state in TargetState::terminal_states() {
        println!("  {}: {}", state, summary.count(state));
    }
    println!();

    println!("Success Rate: {:.1}%", summary.success_rate());
}
