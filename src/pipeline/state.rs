use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::SriError;

/// Lifecycle of one invoice against the SRI.
///
/// ```text
/// Built -> Signed -> Submitted -> Received -> AuthorizationRequested -> Authorized
///                              \-> RejectedAtReception         |   \-> RejectedAtAuthorization
///                                                              \-> InProcess -> AuthorizationRequested
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    Built,
    Signed,
    Submitted,
    Received,
    RejectedAtReception,
    AuthorizationRequested,
    Authorized,
    InProcess,
    RejectedAtAuthorization,
}

impl SubmissionState {
    pub fn initial() -> Self {
        Self::Built
    }

    /// No further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Authorized | Self::RejectedAtReception | Self::RejectedAtAuthorization
        )
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Built, Signed)
                | (Signed, Submitted)
                | (Submitted, Received)
                | (Submitted, RejectedAtReception)
                | (Received, AuthorizationRequested)
                | (AuthorizationRequested, Authorized)
                | (AuthorizationRequested, InProcess)
                | (AuthorizationRequested, RejectedAtAuthorization)
                | (InProcess, AuthorizationRequested)
        )
    }

    /// Move to `next`, failing on an edge the lifecycle does not have.
    pub fn transition(self, next: Self) -> Result<Self, SriError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SriError::Validation(format!(
                "invalid submission transition {self} -> {next}"
            )))
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Built => "BUILT",
            Self::Signed => "SIGNED",
            Self::Submitted => "SUBMITTED",
            Self::Received => "RECEIVED",
            Self::RejectedAtReception => "REJECTED_AT_RECEPTION",
            Self::AuthorizationRequested => "AUTHORIZATION_REQUESTED",
            Self::Authorized => "AUTHORIZED",
            Self::InProcess => "IN_PROCESS",
            Self::RejectedAtAuthorization => "REJECTED_AT_AUTHORIZATION",
        };
        f.write_str(s)
    }
}
