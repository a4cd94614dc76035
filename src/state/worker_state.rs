/// Worker state definitions for the crawl cycle
///
/// Each worker walks `Idle → Fetching → Extracting → Updating → Idle` once per
/// claimed URL and ends in `Stopped`.
use crate::GatherError;
use std::fmt;

/// Represents where a worker is within its fetch-extract-store cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Waiting for a URL to claim
    Idle,

    /// Checking robots.txt, waiting on the rate limiter, downloading
    Fetching,

    /// Parsing HTML and, if enabled, summarizing
    Extracting,

    /// Writing the record and merging discovered links into the frontier
    Updating,

    /// Terminal: the frontier is exhausted or shutdown was requested
    Stopped,
}

impl WorkerState {
    /// Checks whether moving from `self` to `next` is a legal transition
    ///
    /// A busy worker may jump straight to `Updating`: a URL that is disallowed,
    /// fails to download, or is not HTML still has to be completed.
    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Idle, Stopped)
                | (Fetching, Extracting)
                | (Fetching, Updating)
                | (Extracting, Updating)
                | (Updating, Idle)
        )
    }

    /// Performs a transition, rejecting illegal ones
    pub fn transition(&mut self, next: WorkerState) -> Result<(), GatherError> {
        if !self.can_transition_to(next) {
            return Err(GatherError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Updating => "updating",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
