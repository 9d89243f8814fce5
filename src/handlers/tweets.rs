// Tweet handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::{
    auth::AuthUser,
    db::Database,
    error::ApiError,
    models::tweet::CreateTweetRequest,
    response::Envelope,
};

/// Post a tweet as the authenticated user
/// POST /tweets
pub async fn create_tweet(
    auth: AuthUser,
    State(db): State<Arc<Database>>,
    payload: Result<Json<CreateTweetRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::validation(rejection.body_text()))?;
    info!("Creating tweet for user id: {}", auth.id);

    let tweet = db.create_tweet(auth.id, request).await?;

    info!("Successfully created tweet with id: {}", tweet.id);
    Ok((StatusCode::CREATED, Json(Envelope::success(tweet))))
}

/// Tweet with author, favorites and replies
/// GET /tweets/:id
pub async fn get_tweet(
    State(db): State<Arc<Database>>,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    info!("Fetching tweet with id: {}", tweet_id);

    let tweet = db.get_tweet_detail(&tweet_id).await?;

    Ok((StatusCode::OK, Json(Envelope::success(tweet))))
}
