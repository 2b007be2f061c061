use axum::{extract::State, response::IntoResponse};

use streak_types::api::MessageResponse;
use streak_types::models::Account;

use crate::error::ApiError;
use crate::extract::{Json, Path};
use crate::state::{AppState, run_db};

fn message(text: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        message: text.to_string(),
    })
}

fn accounts(rows: Vec<streak_db::models::AccountRow>) -> Json<Vec<Account>> {
    Json(rows.into_iter().map(Account::from).collect())
}

pub async fn send_request(
    State(state): State<AppState>,
    Path((sender_id, receiver_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    run_db(&state, move |db| db.send_friend_request(sender_id, receiver_id)).await?;
    Ok(message("Friend request sent."))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Path((sender_id, receiver_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    run_db(&state, move |db| db.accept_friend_request(sender_id, receiver_id)).await?;
    Ok(message("Friend request accepted and friendship established."))
}

pub async fn reject_request(
    State(state): State<AppState>,
    Path((sender_id, receiver_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    run_db(&state, move |db| db.reject_friend_request(sender_id, receiver_id)).await?;
    Ok(message("Friend request rejected."))
}

pub async fn list_friends(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.friends_of(account_id)).await?;
    Ok(accounts(rows))
}

pub async fn sent_requests(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.sent_friend_requests(account_id)).await?;
    Ok(accounts(rows))
}

pub async fn received_requests(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.received_friend_requests(account_id)).await?;
    Ok(accounts(rows))
}
