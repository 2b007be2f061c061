pub mod accounts;
pub mod auth;
pub mod challenges;
pub mod error;
pub mod extract;
pub mod friends;
pub mod middleware;
pub mod predict;
pub mod state;
pub mod verifier;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post, put},
};

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

/// All routes, with state applied. Transport layers (CORS, tracing) are
/// added by the binary.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/accounts/me", get(auth::me))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let accounts = Router::new()
        .route("/accounts", post(accounts::create_account).get(accounts::list_accounts))
        .route("/accounts/search", get(accounts::search_accounts))
        .route("/accounts/leaderboard", get(accounts::leaderboard))
        .route("/accounts/{account_id}", get(accounts::get_account).delete(accounts::delete_account))
        .route("/accounts/{account_id}/username", put(accounts::update_username))
        .route("/accounts/{account_id}/email", put(accounts::update_email));

    let challenges = Router::new()
        .route("/challenges", post(challenges::create_challenge).get(challenges::list_challenges))
        .route("/challenges/{challenge_id}", get(challenges::get_challenge))
        .route("/accounts/{account_id}/challenges", get(challenges::account_challenges))
        .route(
            "/accounts/{account_id}/accept_challenge/{challenge_id}",
            post(challenges::accept_challenge),
        )
        .route(
            "/accounts/{account_id}/complete_challenge/{challenge_id}",
            post(challenges::complete_challenge),
        )
        .route(
            "/accounts/{account_id}/fail_challenge/{challenge_id}",
            post(challenges::fail_challenge),
        )
        .route("/accounts/{account_id}/get_challenge", get(challenges::available_challenge));

    let friends = Router::new()
        .route("/accounts/{account_id}/friends", get(friends::list_friends))
        .route(
            "/accounts/{account_id}/sent_friend_requests",
            get(friends::sent_requests),
        )
        .route(
            "/accounts/{account_id}/received_friend_requests",
            get(friends::received_requests),
        )
        .route(
            "/accounts/{account_id}/send_friend_request/{receiver_id}",
            post(friends::send_request),
        )
        .route(
            "/accounts/{account_id}/accept_friend_request/{receiver_id}",
            post(friends::accept_request),
        )
        .route(
            "/accounts/{account_id}/reject_friend_request/{receiver_id}",
            post(friends::reject_request),
        );

    let predict = Router::new()
        .route("/predict", post(predict::predict))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    Router::new()
        .route("/health", get(health))
        .route("/token", post(auth::login))
        .merge(protected)
        .merge(accounts)
        .merge(challenges)
        .merge(friends)
        .merge(predict)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
