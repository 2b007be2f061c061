use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use tracing::warn;

use streak_db::models::NewAccount;
use streak_types::api::{
    CreateAccountRequest, DetailResponse, UpdateEmailRequest, UpdateUsernameRequest,
};
use streak_types::models::Account;

use crate::auth::hash_password;
use crate::error::ApiError;
use crate::extract::{Json, Path, Query};
use crate::state::{AppState, run_db};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 50;
const PASSWORD_MIN: usize = 8;
const PAGE_LIMIT_MAX: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    10
}

impl Page {
    pub fn limit(&self) -> u32 {
        self.limit.min(PAGE_LIMIT_MAX)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub username: String,
}

pub async fn create_account(
    State(state): State<AppState>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate_email(&req.email)?;
    let username = validate_username(&req.username)?;
    if req.password.chars().count() < PASSWORD_MIN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN
        )));
    }

    let new = NewAccount {
        email,
        username,
        password_hash: hash_password(&req.password)?,
        first_name: req.first_name,
        last_name: req.last_name,
    };

    let row = run_db(&state, move |db| db.create_account(&new)).await?;
    Ok((StatusCode::CREATED, Json(Account::from(row))))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.list_accounts(page.skip, page.limit())).await?;
    Ok(Json(rows.into_iter().map(Account::from).collect::<Vec<_>>()))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = run_db(&state, move |db| db.get_account(account_id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Account not found".into()))?;
    Ok(Json(Account::from(row)))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !run_db(&state, move |db| db.delete_account(account_id)).await? {
        return Err(ApiError::NotFound("Account not found".into()));
    }
    Ok(Json(DetailResponse {
        detail: "Account deleted".into(),
    }))
}

pub async fn update_username(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(req): Json<UpdateUsernameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = validate_username(&req.username)?;
    let row = run_db(&state, move |db| db.update_username(account_id, &username)).await?;
    Ok(Json(Account::from(row)))
}

pub async fn update_email(
    State(state): State<AppState>,
    Path(account_id): Path<i64>,
    Json(req): Json<UpdateEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = validate_email(&req.email)?;
    let row = run_db(&state, move |db| db.update_email(account_id, &email)).await?;
    Ok(Json(Account::from(row)))
}

pub async fn search_accounts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.search_accounts(&query.username)).await?;
    Ok(Json(rows.into_iter().map(Account::from).collect::<Vec<_>>()))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.leaderboard(page.skip, page.limit())).await?;
    Ok(Json(rows.into_iter().map(Account::from).collect::<Vec<_>>()))
}

fn validate_username(raw: &str) -> Result<String, ApiError> {
    let username = raw.trim();
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(ApiError::BadRequest(format!(
            "Username must be between {} and {} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    Ok(username.to_string())
}

/// Loose shape check: one `@`, something before it, a dotted domain after.
fn validate_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        warn!("Rejected malformed email {:?}", email);
        return Err(ApiError::BadRequest("Invalid email address".into()));
    }
    Ok(email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_trimmed_and_length_checked() {
        assert_eq!(validate_username("  bob ").unwrap(), "bob");
        assert!(validate_username("ab").is_err());
        assert!(validate_username(&"x".repeat(51)).is_err());
        assert!(validate_username(&"x".repeat(50)).is_ok());
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("nobody").is_err());
        assert!(validate_email("@b.co").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a@@b.co").is_err());
        assert!(validate_email("a b@c.io").is_err());
    }

    #[test]
    fn page_limit_is_capped() {
        let page = Page { skip: 0, limit: 10_000 };
        assert_eq!(page.limit(), PAGE_LIMIT_MAX);
    }
}
