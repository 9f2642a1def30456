//! Governance state machine
//!
//! Two states and two events. `lock` is legal only from `unlocked`, `unlock`
//! only from `locked`; anything else is rejected, never a silent no-op.

use crate::error::GovernanceError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Governance status of a project
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GovernanceStatus {
    /// Editable; no pack is designated truth
    #[default]
    Unlocked,
    /// A locked snapshot is the truth
    Locked,
}

/// Transition event, as recorded in history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GovernanceEvent {
    /// Designate a pack as truth
    Lock,
    /// Open a working copy from the truth
    Unlock,
}

impl GovernanceEvent {
    /// Stable name, used in history hashing
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lock => "lock",
            Self::Unlock => "unlock",
        }
    }

    /// Status after the event
    #[must_use]
    pub fn target(self) -> GovernanceStatus {
        match self {
            Self::Lock => GovernanceStatus::Locked,
            Self::Unlock => GovernanceStatus::Unlocked,
        }
    }
}

impl Display for GovernanceEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events legal from a status
#[must_use]
pub fn allowed_transitions(from: GovernanceStatus) -> Vec<GovernanceEvent> {
    match from {
        GovernanceStatus::Unlocked => vec![GovernanceEvent::Lock],
        GovernanceStatus::Locked => vec![GovernanceEvent::Unlock],
    }
}

/// Check an event against the current status
///
/// # Errors
/// - [`GovernanceError::AlreadyLocked`] for `lock` while locked
/// - [`GovernanceError::NotLocked`] for `unlock` while unlocked
pub fn validate_transition(
    from: GovernanceStatus,
    event: GovernanceEvent,
) -> Result<GovernanceStatus, GovernanceError> {
    if allowed_transitions(from).contains(&event) {
        return Ok(event.target());
    }
    match event {
        GovernanceEvent::Lock => Err(GovernanceError::AlreadyLocked),
        GovernanceEvent::Unlock => Err(GovernanceError::NotLocked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn lock_and_unlock_alternate() {
        assert_eq!(
            validate_transition(GovernanceStatus::Unlocked, GovernanceEvent::Lock).unwrap(),
            GovernanceStatus::Locked
        );
        assert_eq!(
            validate_transition(GovernanceStatus::Locked, GovernanceEvent::Unlock).unwrap(),
            GovernanceStatus::Unlocked
        );
    }

    #[test]
    fn repeated_events_are_rejected() {
        assert!(matches!(
            validate_transition(GovernanceStatus::Locked, GovernanceEvent::Lock),
            Err(GovernanceError::AlreadyLocked)
        ));
        assert!(matches!(
            validate_transition(GovernanceStatus::Unlocked, GovernanceEvent::Unlock),
            Err(GovernanceError::NotLocked)
        ));
    }

    fn arb_event() -> impl Strategy<Value = GovernanceEvent> {
        prop_oneof![Just(GovernanceEvent::Lock), Just(GovernanceEvent::Unlock)]
    }

    proptest! {
        #[test]
        fn accepted_events_always_alternate(events in prop::collection::vec(arb_event(), 0..40)) {
            let mut status = GovernanceStatus::default();
            let mut accepted = Vec::new();
            for event in events {
                if let Ok(next) = validate_transition(status, event) {
                    status = next;
                    accepted.push(event);
                }
            }
            for (i, event) in accepted.iter().enumerate() {
                let expected = if i % 2 == 0 { GovernanceEvent::Lock } else { GovernanceEvent::Unlock };
                prop_assert_eq!(*event, expected);
            }
            let expected_status = if accepted.len() % 2 == 1 {
                GovernanceStatus::Locked
            } else {
                GovernanceStatus::Unlocked
            };
            prop_assert_eq!(status, expected_status);
        }
    }
}
