use serde::{Deserialize, Serialize};

use crate::models::{Challenge, ChallengeState, ChallengeStatus};

// -- JWT Claims --

/// JWT claims issued by `POST /token` and checked by the bearer middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

// -- Accounts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateAccountRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUsernameRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEmailRequest {
    pub email: String,
}

// -- Challenges --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChallengeRequest {
    pub description: String,
    pub points: i64,
}

/// Wire form of a status. `completed` / `failed` are derived from `state`
/// for clients that still read the flag pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeStatusResponse {
    pub account_id: i64,
    pub challenge_id: i64,
    pub state: ChallengeState,
    pub completed: bool,
    pub failed: bool,
    pub accepted_at: chrono::DateTime<chrono::Utc>,
    pub resolved_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ChallengeStatus> for ChallengeStatusResponse {
    fn from(status: ChallengeStatus) -> Self {
        Self {
            account_id: status.account_id,
            challenge_id: status.challenge_id,
            state: status.state,
            completed: status.state == ChallengeState::Completed,
            failed: status.state == ChallengeState::Failed,
            accepted_at: status.accepted_at,
            resolved_at: status.resolved_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountChallenge {
    #[serde(flatten)]
    pub status: ChallengeStatusResponse,
    pub challenge: Challenge,
}

// -- Misc --

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub predictions: String,
}
