//! Room cleaning state machine.

use serde::{Deserialize, Serialize};

/// The state of one `clean_room` invocation.
///
/// State transitions:
/// ```text
/// Requested ──► Validating ──► Applying ──► Committed
///     │              │             │
///     └──────────────┴─────────────┴──────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CleaningState {
    /// The cleaning was requested but nothing has been read yet.
    #[default]
    Requested,

    /// The room assignment is being computed and checked against stock.
    Validating,

    /// The swap batch is being committed.
    Applying,

    /// Every transition was applied (terminal state).
    Committed,

    /// Nothing was applied (terminal state).
    Failed,
}

impl CleaningState {
    /// Returns true if validation can start.
    pub fn can_validate(&self) -> bool {
        matches!(self, CleaningState::Requested)
    }

    /// Returns true if the batch can be applied.
    pub fn can_apply(&self) -> bool {
        matches!(self, CleaningState::Validating)
    }

    /// Returns true if the cleaning can be marked committed.
    ///
    /// A zero-item assignment commits straight from validation.
    pub fn can_commit(&self) -> bool {
        matches!(self, CleaningState::Validating | CleaningState::Applying)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CleaningState::Committed | CleaningState::Failed)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CleaningState::Requested => "Requested",
            CleaningState::Validating => "Validating",
            CleaningState::Applying => "Applying",
            CleaningState::Committed => "Committed",
            CleaningState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for CleaningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_requested() {
        assert_eq!(CleaningState::default(), CleaningState::Requested);
    }

    #[test]
    fn can_validate() {
        assert!(CleaningState::Requested.can_validate());
        assert!(!CleaningState::Validating.can_validate());
        assert!(!CleaningState::Applying.can_validate());
        assert!(!CleaningState::Committed.can_validate());
        assert!(!CleaningState::Failed.can_validate());
    }

    #[test]
    fn can_apply() {
        assert!(!CleaningState::Requested.can_apply());
        assert!(CleaningState::Validating.can_apply());
        assert!(!CleaningState::Applying.can_apply());
        assert!(!CleaningState::Committed.can_apply());
    }

    #[test]
    fn can_commit() {
        assert!(!CleaningState::Requested.can_commit());
        assert!(CleaningState::Validating.can_commit());
        assert!(CleaningState::Applying.can_commit());
        assert!(!CleaningState::Failed.can_commit());
    }

    #[test]
    fn terminal_states() {
        assert!(!CleaningState::Requested.is_terminal());
        assert!(!CleaningState::Validating.is_terminal());
        assert!(!CleaningState::Applying.is_terminal());
        assert!(CleaningState::Committed.is_terminal());
        assert!(CleaningState::Failed.is_terminal());
    }

    #[test]
    fn display() {
        assert_eq!(CleaningState::Validating.to_string(), "Validating");
        assert_eq!(CleaningState::Committed.to_string(), "Committed");
    }

    #[test]
    fn serialization() {
        let state = CleaningState::Applying;
        let json = serde_json::to_string(&state).unwrap();
        let deserialized: CleaningState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, deserialized);
    }
}
