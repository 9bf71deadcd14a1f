//! Crawl target state definitions
//!
//! Every URL handed to a crawl worker moves through these states once per run.
use std::fmt;
use thiserror::Error;

/// A transition the target state machine does not allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid target transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TargetState,
    pub to: TargetState,
}

/// Represents the current state of a crawl target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetState {
    // ===== Active States =====
    /// Target is in the frontier and nobody owns it yet
    Unclaimed,

    /// A worker claimed the URL and is processing it
    Claimed,

    // ===== Terminal States =====
    /// Page was fetched and its record written
    Recorded,

    /// Fetch or parse failed; nothing was recorded
    FetchFailed,

    /// Target was deeper than the configured maximum
    DepthExceeded,

    /// Target was a document and its body was saved to disk
    DocumentSaved,
}

impl TargetState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if this is an active state
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Unclaimed | Self::Claimed)
    }

    /// Returns true if the target produced an output row
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Recorded | Self::DocumentSaved)
    }

    /// Returns true if a transition from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: TargetState) -> bool {
        match self {
            Self::Unclaimed => matches!(next, Self::Claimed | Self::DepthExceeded),
            Self::Claimed => next.is_terminal(),
            _ => false,
        }
    }

    /// Moves to `next` if the transition is allowed
    ///
    /// # Returns
    ///
    /// * `Ok(next)` - The transition is valid
    /// * `Err(InvalidTransition)` - `self` is terminal or `next` is not reachable from it
    pub fn advance(self, next: TargetState) -> Result<TargetState, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unclaimed => "unclaimed",
            Self::Claimed => "claimed",
            Self::Recorded => "recorded",
            Self::FetchFailed => "fetch_failed",
            Self::DepthExceeded => "depth_exceeded",
            Self::DocumentSaved => "document_saved",
        }
    }

    /// Returns all terminal states
    pub fn terminal_states() -> [Self; 4] {
        [
            Self::Recorded,
            Self::FetchFailed,
            Self::DepthExceeded,
            Self::DocumentSaved,
        ]
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
