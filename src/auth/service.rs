use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest},
        jwt::JwtKeys,
        password,
        repo::{UserStore, ROLE_USER},
    },
    error::ApiError,
};

fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,50}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

pub async fn register(
    users: &dyn UserStore,
    keys: &JwtKeys,
    mut payload: RegisterRequest,
) -> Result<AuthResponse, ApiError> {
    payload.username = payload.username.trim().to_string();

    if !is_valid_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err(ApiError::Validation("invalid username".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("password too short".into()));
    }

    // Pre-check for a friendly error; the store still rejects duplicates on
    // insert if another request wins the race.
    if users.find_by_username(&payload.username).await?.is_some() {
        warn!(username = %payload.username, "username already taken");
        return Err(ApiError::Conflict);
    }

    let hash = password::hash_password(&payload.password)?;
    let user = users.insert(&payload.username, &hash, ROLE_USER).await?;

    let access_token = keys.issue_access(&user.username)?;
    info!(user_id = user.id, username = %user.username, "user registered");
    Ok(AuthResponse { access_token })
}

pub async fn login(
    users: &dyn UserStore,
    keys: &JwtKeys,
    payload: LoginRequest,
) -> Result<AuthResponse, ApiError> {
    let username = payload.username.trim();

    let user = users.find_by_username(username).await?.ok_or_else(|| {
        warn!(username = %username, "login for unknown username");
        ApiError::UserNotFound
    })?;

    if !password::verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login with wrong password");
        return Err(ApiError::InvalidCredentials);
    }

    let access_token = keys.issue_access(&user.username)?;
    info!(user_id = user.id, username = %user.username, "user logged in");
    Ok(AuthResponse { access_token })
}

pub async fn refresh(
    users: &dyn UserStore,
    keys: &JwtKeys,
    payload: RefreshRequest,
) -> Result<AuthResponse, ApiError> {
    let subject = keys.extract_subject(&payload.refresh_token)?;
    if keys.verify(&payload.refresh_token)?.is_expired {
        warn!(username = %subject, "expired refresh token");
        return Err(ApiError::InvalidToken);
    }

    let user = users.find_by_username(&subject).await?.ok_or_else(|| {
        warn!(username = %subject, "refresh for an account that no longer exists");
        ApiError::UserNotFound
    })?;

    // A new access token only; the refresh token itself is never rotated.
    let access_token = keys.issue_access(&user.username)?;
    info!(user_id = user.id, "access token refreshed");
    Ok(AuthResponse { access_token })
}
