// Account handlers
// Signup, login, and the authenticated `/account` routes

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    auth::{AuthToken, AuthUser, TokenService},
    db::Database,
    error::{ApiError, ApiResult},
    models::user::{LoginRequest, SignupRequest, UpdateProfileRequest, User},
    response::Envelope,
};

pub const SIGNUP_FAILED: &str = "There was a problem creating the user, please try again later.";
pub const UPDATE_PROFILE_FAILED: &str =
    "There was a problem updating profile, please try again later.";

/// Register a new user and return a token for them
/// POST /signup
pub async fn signup(
    State(db): State<Arc<Database>>,
    State(tokens): State<Arc<TokenService>>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let token = register(&db, &tokens, payload)
        .await
        .map_err(|e| e.or_bad_request(SIGNUP_FAILED))?;

    Ok((StatusCode::OK, Json(Envelope::success(token))))
}

async fn register(
    db: &Database,
    tokens: &TokenService,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<AuthToken> {
    let Json(request) = payload.map_err(|rejection| ApiError::validation(rejection.body_text()))?;

    // Validate before hashing so malformed input never reaches bcrypt
    request.validate().map_err(ApiError::Validation)?;
    info!("Signing up user with username: {}", request.username.trim());

    let password_hash = tokens.hash_password(request.password.clone()).await?;
    let user = db.create_user(request.into_user(password_hash)).await?;
    let token = tokens.generate(&user)?;

    info!("Successfully signed up user with id: {}", user.id);
    Ok(token)
}

/// Exchange email and password for a token
/// POST /login
pub async fn login(
    State(db): State<Arc<Database>>,
    State(tokens): State<Arc<TokenService>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let token = authenticate(&db, &tokens, payload).await.map_err(|err| {
        if !matches!(err, ApiError::InvalidCredentials) {
            warn!(error = %err, "Login failed");
        }
        ApiError::InvalidCredentials
    })?;

    Ok((StatusCode::OK, Json(Envelope::success(token))))
}

async fn authenticate(
    db: &Database,
    tokens: &TokenService,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthToken> {
    let Json(request) = payload.map_err(|_| ApiError::InvalidCredentials)?;

    let user = db.find_user_by_email(&request.normalized_email()).await?;

    // Unknown emails still run one bcrypt verification
    let stored_hash = user.as_ref().map(|u| u.password.clone());
    let verified = tokens.check_credentials(request.password, stored_hash).await?;

    match user {
        Some(user) if verified => {
            info!("User {} logged in", user.id);
            tokens.generate(&user)
        }
        Some(user) => {
            info!("Rejected login for user id: {}", user.id);
            Err(ApiError::InvalidCredentials)
        }
        None => Err(ApiError::InvalidCredentials),
    }
}

/// Profile of the authenticated user with tweets, following, followers
/// and favorites
/// GET /account/me
pub async fn me(
    auth: AuthUser,
    State(db): State<Arc<Database>>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Fetching profile for user id: {}", auth.id);

    let profile = db.get_user_profile(auth.id).await?;

    Ok((StatusCode::OK, Json(Envelope::success(profile))))
}

/// Replace the authenticated user's profile attributes
/// PUT /account/update_profile
pub async fn update_profile(
    auth: AuthUser,
    State(db): State<Arc<Database>>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Updating profile for user id: {}", auth.id);

    let user = save_profile(&db, &auth, payload)
        .await
        .map_err(|e| e.or_bad_request(UPDATE_PROFILE_FAILED))?;

    Ok((StatusCode::OK, Json(Envelope::with_message("Profile updated!", user))))
}

async fn save_profile(
    db: &Database,
    auth: &AuthUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<User> {
    let Json(request) = payload.map_err(|rejection| ApiError::validation(rejection.body_text()))?;

    let user = db.update_profile(auth.id, request).await?;

    info!("Successfully updated profile for user id: {}", user.id);
    Ok(user)
}
