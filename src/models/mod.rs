// Models module

pub mod user;
pub mod tweet;
pub mod profile;

// Re-export commonly used types
pub use user::{User, SignupRequest, LoginRequest, UpdateProfileRequest};
pub use tweet::{Tweet, Favorite, Reply, TweetDetail, CreateTweetRequest};
pub use profile::{UserProfile, FavoriteDetail};
