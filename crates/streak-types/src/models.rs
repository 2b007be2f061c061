use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Public view of an account. The password hash never leaves `streak-db`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub points: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Largest magnitude a challenge's point value may have.
pub const MAX_CHALLENGE_POINTS: i64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: i64,
    pub description: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a challenge an account has taken on.
///
/// `Accepted` is the only state that can move; `Completed` and `Failed`
/// are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeState {
    Accepted,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Challenge cannot be completed because it has already failed.")]
    CompleteAfterFail,

    #[error("Challenge cannot be failed because it has already been completed.")]
    FailAfterComplete,

    #[error("Challenge has already been {0}.")]
    AlreadyResolved(ChallengeState),

    #[error("Challenge cannot move back to accepted.")]
    Reopen,
}

impl ChallengeState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Accepted)
    }

    /// Validate a move from `self` to `next`, returning the new state.
    pub fn transition(self, next: ChallengeState) -> Result<ChallengeState, TransitionError> {
        match (self, next) {
            (Self::Accepted, Self::Completed | Self::Failed) => Ok(next),
            (Self::Failed, Self::Completed) => Err(TransitionError::CompleteAfterFail),
            (Self::Completed, Self::Failed) => Err(TransitionError::FailAfterComplete),
            (_, Self::Accepted) => Err(TransitionError::Reopen),
            (current, _) => Err(TransitionError::AlreadyResolved(current)),
        }
    }

    /// Sign applied to the challenge's point value when entering this state.
    pub fn point_sign(self) -> i64 {
        match self {
            Self::Accepted => 0,
            Self::Completed => 1,
            Self::Failed => -1,
        }
    }
}

/// Whether `points` is an acceptable value for a new challenge.
pub fn points_in_range(points: i64) -> bool {
    (-MAX_CHALLENGE_POINTS..=MAX_CHALLENGE_POINTS).contains(&points)
}

impl fmt::Display for ChallengeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown challenge state '{0}'")]
pub struct UnknownState(pub String);

impl FromStr for ChallengeState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(Self::Accepted),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownState(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeStatus {
    pub account_id: i64,
    pub challenge_id: i64,
    pub state: ChallengeState,
    pub accepted_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
