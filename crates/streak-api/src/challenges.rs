use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use streak_types::api::{AccountChallenge, ChallengeStatusResponse, CreateChallengeRequest};
use streak_types::models::{
    Account, Challenge, ChallengeStatus, MAX_CHALLENGE_POINTS, points_in_range,
};

use crate::accounts::Page;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::{AppState, run_db};

#[derive(Debug, Deserialize)]
pub struct PointRange {
    pub min_points: i64,
    pub max_points: i64,
}

pub async fn create_challenge(
    State(state): State<AppState>,
    Json(req): Json<CreateChallengeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let description = req.description.trim().to_string();
    if description.is_empty() {
        return Err(ApiError::BadRequest("Challenge description is required".into()));
    }
    if !points_in_range(req.points) {
        return Err(ApiError::BadRequest(format!(
            "Challenge points must be between -{MAX_CHALLENGE_POINTS} and {MAX_CHALLENGE_POINTS}"
        )));
    }

    let row = run_db(&state, move |db| db.create_challenge(&description, req.points)).await?;
    Ok((StatusCode::CREATED, Json(Challenge::from(row))))
}

pub async fn list_challenges(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.list_challenges(page.skip, page.limit())).await?;
    Ok(Json(rows.into_iter().map(Challenge::from).collect::<Vec<_>>()))
}

pub async fn get_challenge(
    State(state): State<AppState>,
    Path(challenge_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.get_challenge(challenge_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Challenge not found".into()))?;
    Ok(Json(Challenge::from(row)))
}

pub async fn accept_challenge(
    State(state): State<AppState>,
    Path((account_id, challenge_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.accept_challenge(account_id, challenge_id)).await?;
    Ok(Json(ChallengeStatusResponse::from(ChallengeStatus::from(row))))
}

pub async fn complete_challenge(
    State(state): State<AppState>,
    Path((account_id, challenge_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.complete_challenge(account_id, challenge_id)).await?;
    Ok(Json(Account::from(row)))
}

pub async fn fail_challenge(
    State(state): State<AppState>,
    Path((account_id, challenge_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.fail_challenge(account_id, challenge_id)).await?;
    Ok(Json(Account::from(row)))
}

/// GET /accounts/{id}/challenges
pub async fn account_challenges(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.account_challenges(account_id)).await?;

    let body: Vec<AccountChallenge> = rows
        .into_iter()
        .map(|(status, challenge)| AccountChallenge {
            status: ChallengeStatus::from(status).into(),
            challenge: challenge.into(),
        })
        .collect();
    Ok(Json(body))
}

/// GET /accounts/{id}/get_challenge?min_points=&max_points=
pub async fn available_challenge(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Query(range): Query<PointRange>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| {
        db.available_challenge(account_id, range.min_points, range.max_points)
    })
    .await?
    .ok_or_else(|| {
        ApiError::NotFound("No available challenge found within the specified points range.".into())
    })?;

    Ok(Json(Challenge::from(row)))
}
