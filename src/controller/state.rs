//! Verification states and their guarded transitions.

use serde::Serialize;

/// Where an attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    /// Consent not given
    Idle,
    /// Consent given, observation running
    Checked,
    /// Attempt in flight
    Submitting,
    /// Attempt completed
    Verified,
    /// Attempt failed locally; a retry is offered
    Failed,
}

impl VerificationState {
    /// Next state after the consent control is toggled, if toggling is
    /// allowed here.
    pub fn on_toggle(self) -> Option<Self> {
        match self {
            VerificationState::Idle => Some(VerificationState::Checked),
            VerificationState::Checked | VerificationState::Failed => Some(VerificationState::Idle),
            VerificationState::Submitting | VerificationState::Verified => None,
        }
    }

    /// Next state after a verify action.
    pub fn on_verify(self) -> Option<Self> {
        match self {
            VerificationState::Checked => Some(VerificationState::Submitting),
            _ => None,
        }
    }

    /// Re-arm after a failure.
    pub fn on_retry(self) -> Option<Self> {
        match self {
            VerificationState::Failed => Some(VerificationState::Checked),
            _ => None,
        }
    }

    /// Next state once the in-flight attempt ends.
    pub fn on_complete(self, succeeded: bool) -> Option<Self> {
        match (self, succeeded) {
            (VerificationState::Submitting, true) => Some(VerificationState::Verified),
            (VerificationState::Submitting, false) => Some(VerificationState::Failed),
            _ => None,
        }
    }

    /// Whether consent is currently given.
    pub fn is_checked(self) -> bool {
        matches!(
            self,
            VerificationState::Checked | VerificationState::Submitting | VerificationState::Failed
        )
    }

    pub fn is_terminal(self) -> bool {
        self == VerificationState::Verified
    }
}

impl std::fmt::Display for VerificationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationState::Idle => write!(f, "idle"),
            VerificationState::Checked => write!(f, "checked"),
            VerificationState::Submitting => write!(f, "submitting"),
            VerificationState::Verified => write!(f, "verified"),
            VerificationState::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Apply toggles from Idle and report whether verify is accepted.
    fn verify_after_toggles(toggles: usize) -> bool {
        let mut state = VerificationState::Idle;
        for _ in 0..toggles {
            state = state.on_toggle().unwrap();
        }
        state.on_verify().is_some()
    }

    #[test]
    fn test_verify_requires_consent() {
        for toggles in 0..8 {
            assert_eq!(verify_after_toggles(toggles), toggles % 2 == 1, "toggles = {toggles}");
        }
    }

    #[test]
    fn test_submitting_ignores_input() {
        let state = VerificationState::Submitting;
        assert_eq!(state.on_verify(), None);
        assert_eq!(state.on_toggle(), None);
        assert_eq!(state.on_retry(), None);
    }

    #[test]
    fn test_completion_only_from_submitting() {
        assert_eq!(
            VerificationState::Submitting.on_complete(true),
            Some(VerificationState::Verified)
        );
        assert_eq!(
            VerificationState::Submitting.on_complete(false),
            Some(VerificationState::Failed)
        );
        assert_eq!(VerificationState::Checked.on_complete(true), None);
        assert_eq!(VerificationState::Verified.on_complete(true), None);
    }

    #[test]
    fn test_failed_can_retry_or_clear() {
        let failed = VerificationState::Failed;
        assert_eq!(failed.on_retry(), Some(VerificationState::Checked));
        assert_eq!(failed.on_toggle(), Some(VerificationState::Idle));
        assert_eq!(failed.on_verify(), None);
        assert!(failed.is_checked());
    }

    #[test]
    fn test_verified_is_terminal() {
        let verified = VerificationState::Verified;
        assert!(verified.is_terminal());
        assert_eq!(verified.on_toggle(), None);
        assert_eq!(verified.on_verify(), None);
        assert_eq!(verified.to_string(), "verified");
    }
}
