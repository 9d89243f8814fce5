// Library root for the Chirp accounts API

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod response;
pub mod routes;

// Re-export commonly used types
pub use auth::{AuthToken, AuthUser, TokenService};
pub use db::Database;
pub use error::ApiError;
pub use models::{User, UserProfile, SignupRequest, LoginRequest, UpdateProfileRequest};
pub use routes::{create_router, AppState};
