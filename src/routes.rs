use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use std::{sync::Arc, time::Duration};

use crate::{
    auth::TokenService,
    db::Database,
    handlers::{
        accounts::{login, me, signup, update_profile},
        health_check,
        tweets::{create_tweet, get_tweet},
    },
    middleware::apply_middleware,
};

/// Shared state handed to every handler. Handlers extract the part they
/// need through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub tokens: Arc<TokenService>,
}

impl FromRef<AppState> for Arc<Database> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.db)
    }
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.tokens)
    }
}

/// Create the Axum router with all endpoints and middleware
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    let router = Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Public account endpoints
        .route("/signup", post(signup))
        .route("/login", post(login))
        // Authenticated account endpoints
        .route("/account/me", get(me))
        .route(
            "/account/update_profile",
            axum::routing::put(update_profile).patch(update_profile),
        )
        // Tweets
        .route("/tweets", post(create_tweet))
        .route("/tweets/:id", get(get_tweet))
        .with_state(state);

    apply_middleware(router, request_timeout)
}
