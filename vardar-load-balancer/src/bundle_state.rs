use std::collections::HashMap;

use thiserror::Error;

/// Ownership state of a bundle as tracked by the cluster's service-unit
/// channel. Absence of an entry (`None`) is the tombstone pseudo-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleState {
    Owned,
    Assigned,
    /// Source broker released the bundle during a transfer.
    Released,
    Splitting,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid bundle state transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: Option<BundleState>,
    pub to: Option<BundleState>,
}

/// Whether `from -> to` is in the valid transition table.
pub fn is_valid_transition(from: Option<BundleState>, to: Option<BundleState>) -> bool {
    use BundleState::*;
    matches!(
        (from, to),
        // first assignment, or ownership right out of a split
        (None, Some(Owned)) | (None, Some(Assigned))
            // transfer begins, split begins, recovery
            | (Some(Owned), Some(Assigned)) | (Some(Owned), Some(Splitting)) | (Some(Owned), None)
            // assignment completes, transfer hand-off, recovery
            | (Some(Assigned), Some(Owned)) | (Some(Assigned), Some(Released)) | (Some(Assigned), None)
            // destination accepts, recovery
            | (Some(Released), Some(Owned)) | (Some(Released), None)
            // split complete or recovered
            | (Some(Splitting), None)
    )
}

/// Bundle-id keyed state map applying only validated transitions.
#[derive(Debug, Default)]
pub struct BundleStateTracker {
    states: HashMap<String, BundleState>,
}

impl BundleStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, bundle: &str) -> Option<BundleState> {
        self.states.get(bundle).copied()
    }

    /// Apply a transition for `bundle`; `None` tombstones the entry.
    pub fn transition(
        &mut self,
        bundle: &str,
        to: Option<BundleState>,
    ) -> Result<(), InvalidTransition> {
        let from = self.state(bundle);
        if !is_valid_transition(from, to) {
            return Err(InvalidTransition { from, to });
        }
        match to {
            Some(state) => {
                self.states.insert(bundle.to_owned(), state);
            }
            None => {
                self.states.remove(bundle);
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
