use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use super::user::User;

const MAX_TWEET_LEN: usize = 280;

/// A short post authored by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tweet: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user marking a tweet as a favorite
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tweet_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A reply left on a tweet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tweet_id: Uuid,
    pub reply: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tweet with its author, favorites and replies loaded.
#[derive(Debug, Clone, Serialize)]
pub struct TweetDetail {
    #[serde(flatten)]
    pub tweet: Tweet,
    pub user: User,
    pub favorites: Vec<Favorite>,
    pub replies: Vec<Reply>,
}

/// Body of `POST /tweets`
#[derive(Debug, Deserialize)]
pub struct CreateTweetRequest {
    pub tweet: String,
}

impl Tweet {
    pub fn new(user_id: Uuid, tweet: String) -> Self {
        let now = Utc::now();

        Tweet {
            id: Uuid::new_v4(),
            user_id,
            tweet,
            created_at: now,
            updated_at: now,
        }
    }
}

impl CreateTweetRequest {
    pub fn validate(&self) -> Result<(), String> {
        let tweet = self.tweet.trim();

        if tweet.is_empty() {
            return Err("Tweet cannot be empty".to_string());
        }

        if tweet.chars().count() > MAX_TWEET_LEN {
            return Err(format!("Tweet cannot exceed {} characters", MAX_TWEET_LEN));
        }

        Ok(())
    }

    pub fn into_tweet(self, user_id: Uuid) -> Tweet {
        Tweet::new(user_id, self.tweet.trim().to_string())
    }
}
