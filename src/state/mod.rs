//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `TargetState`: lifecycle of one crawl target within a run
//! - `CrawlTarget`: a URL and its depth below the search results
//! - `RunState` / `RunSnapshot`: run parameters and the resumable snapshot

mod run_state;
mod target_state;

// Re-export main types
pub use run_state::{CrawlTarget, DateRange, RunSnapshot, RunState, RunStatus};
pub use target_state::{InvalidTransition, TargetState};
