use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, extract::State, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{error, info};

use streak_types::api::{Claims, LoginRequest, TokenResponse};
use streak_types::models::Account;

use crate::error::ApiError;
use crate::extract::Json;
use crate::state::{AppState, run_db};

const BAD_CREDENTIALS: &str = "Incorrect email or password";

/// POST /token: exchange email + password for a bearer token.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.clone();
    let account = run_db(&state, move |db| db.get_account_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized(BAD_CREDENTIALS))?;

    if !verify_password(&req.password, &account.password)? {
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
    }

    let access_token = create_token(&state.jwt_secret, state.token_ttl, account.id, &account.username)?;
    info!("Account {} logged in", account.id);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

/// GET /accounts/me: the account behind the bearer token.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let account = run_db(&state, move |db| db.get_account(claims.sub))
        .await?
        .ok_or(ApiError::Unauthorized("Could not validate credentials"))?;

    Ok(Json(Account::from(account)))
}

/// Argon2id PHC string for `password`.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Password hashing failed: {}", e);
            ApiError::Internal
        })
}

pub fn verify_password(password: &str, stored: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!("Stored password hash is unreadable: {}", e);
        ApiError::Internal
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn create_token(
    secret: &str,
    ttl: chrono::Duration,
    account_id: i64,
    username: &str,
) -> Result<String, ApiError> {
    let expires = chrono::Utc::now().checked_add_signed(ttl).ok_or_else(|| {
        error!("Token lifetime {} is out of range", ttl);
        ApiError::Internal
    })?;
    let claims = Claims {
        sub: account_id,
        username: username.to_string(),
        exp: expires.timestamp().max(0) as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).map_err(|e| {
        error!("Token encoding failed: {}", e);
        ApiError::Internal
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn token_round_trips_claims() {
        let token = create_token("secret", chrono::Duration::minutes(5), 42, "alice").unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.sub, 42);
        assert_eq!(data.claims.username, "alice");
    }

    #[test]
    fn unrepresentable_lifetime_is_an_error() {
        assert!(create_token("secret", chrono::TimeDelta::MAX, 42, "alice").is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = create_token("secret", chrono::Duration::minutes(-10), 42, "alice").unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }
}
