//! Frontier entry state definitions
//!
//! Every frontier entry moves `Queued -> Dispatched -> terminal` exactly once.
use crate::HarvestError;
use serde::Serialize;
use std::fmt;

/// Represents where a frontier entry is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryState {
    // ===== Active States =====
    /// Waiting in the frontier
    Queued,

    /// Handed to a fetch task
    Dispatched,

    // ===== Terminal States =====
    /// Fetched as HTML, extracted, links discovered
    HtmlProcessed,

    /// Fetched as a non-HTML resource and recorded
    ResourceRecorded,

    /// Dropped before fetching (visited, out of scope, robots, cap)
    Skipped,

    /// Fetch failed (network error, timeout, error status)
    Failed,
}

impl EntryState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Queued | Self::Dispatched)
    }

    /// Checks whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: EntryState) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Dispatched | Self::Skipped),
            Self::Dispatched => next.is_terminal(),
            _ => false,
        }
    }

    /// Performs a transition, rejecting illegal ones
    pub fn transition(self, next: EntryState) -> Result<EntryState, HarvestError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(HarvestError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Stable lowercase name used in logs and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Dispatched => "dispatched",
            Self::HtmlProcessed => "html-processed",
            Self::ResourceRecorded => "resource-recorded",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!EntryState::Queued.is_terminal());
        assert!(!EntryState::Dispatched.is_terminal());

        assert!(EntryState::HtmlProcessed.is_terminal());
        assert!(EntryState::ResourceRecorded.is_terminal());
        assert!(EntryState::Skipped.is_terminal());
        assert!(EntryState::Failed.is_terminal());
    }

    #[test]
    fn test_happy_path() {
        let state = EntryState::Queued
            .transition(EntryState::Dispatched)
            .and_then(|s| s.transition(EntryState::HtmlProcessed))
            .unwrap();
        assert_eq!(state, EntryState::HtmlProcessed);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_skip_before_dispatch() {
        assert!(EntryState::Queued.transition(EntryState::Skipped).is_ok());
        assert!(EntryState::Dispatched.transition(EntryState::Skipped).is_ok());
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(EntryState::Queued
            .transition(EntryState::HtmlProcessed)
            .is_err());
        assert!(EntryState::HtmlProcessed
            .transition(EntryState::Dispatched)
            .is_err());
        assert!(matches!(
            EntryState::Failed.transition(EntryState::Queued),
            Err(HarvestError::InvalidTransition {
                from: EntryState::Failed,
                to: EntryState::Queued
            })
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(EntryState::HtmlProcessed.to_string(), "html-processed");
        assert_eq!(EntryState::Failed.to_string(), "failed");
    }
}
