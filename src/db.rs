use crate::config::{DatabaseConfig, DatabaseTarget};
use crate::error::ApiError;
use crate::models::profile::{assemble_tweet_details, UserProfile};
use crate::models::tweet::{CreateTweetRequest, Favorite, Reply, Tweet, TweetDetail};
use crate::models::user::{UpdateProfileRequest, User};
use deadpool_postgres::{Config, ManagerConfig, Object, Pool, PoolConfig, RecyclingMethod, Runtime};
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::collections::HashMap;
use tokio_postgres::Row;
use tracing::{error, info};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, name, username, email, password, location, bio, website_url, created_at, updated_at";

/// Same columns as `USER_COLUMNS`, qualified for queries that alias `users` as `u`.
const JOINED_USER_COLUMNS: &str =
    "u.id, u.name, u.username, u.email, u.password, u.location, u.bio, u.website_url, u.created_at, u.updated_at";

/// Schema statements, applied in order at startup. Each one is idempotent.
const MIGRATIONS: &[(&str, &str)] = &[
    ("uuid extension", "CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\""),
    (
        "users table",
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            name VARCHAR(255) NOT NULL,
            username VARCHAR(50) NOT NULL,
            email VARCHAR(255) NOT NULL,
            password VARCHAR(255) NOT NULL,
            location VARCHAR(255),
            bio TEXT,
            website_url VARCHAR(255),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT users_username_key UNIQUE (username),
            CONSTRAINT users_email_key UNIQUE (email)
        )
        "#,
    ),
    (
        "tweets table",
        r#"
        CREATE TABLE IF NOT EXISTS tweets (
            id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            tweet VARCHAR(280) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "tweets user_id index",
        "CREATE INDEX IF NOT EXISTS idx_tweets_user_id ON tweets(user_id, created_at DESC)",
    ),
    (
        "followers table",
        r#"
        CREATE TABLE IF NOT EXISTS followers (
            id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            follower_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT followers_user_id_follower_id_key UNIQUE (user_id, follower_id)
        )
        "#,
    ),
    (
        "followers follower_id index",
        "CREATE INDEX IF NOT EXISTS idx_followers_follower_id ON followers(follower_id)",
    ),
    (
        "favorites table",
        r#"
        CREATE TABLE IF NOT EXISTS favorites (
            id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            tweet_id UUID NOT NULL REFERENCES tweets(id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT favorites_user_id_tweet_id_key UNIQUE (user_id, tweet_id)
        )
        "#,
    ),
    (
        "favorites tweet_id index",
        "CREATE INDEX IF NOT EXISTS idx_favorites_tweet_id ON favorites(tweet_id)",
    ),
    (
        "replies table",
        r#"
        CREATE TABLE IF NOT EXISTS replies (
            id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
            user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            tweet_id UUID NOT NULL REFERENCES tweets(id) ON DELETE CASCADE,
            reply TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "replies tweet_id index",
        "CREATE INDEX IF NOT EXISTS idx_replies_tweet_id ON replies(tweet_id, created_at)",
    ),
];

/// Repository over a deadpool PostgreSQL pool. Every account and tweet
/// query the handlers need lives here.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl Database {
    /// Builds the pool and checks that a connection can be established.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, ApiError> {
        let db = Self::connect_lazy(config)?;
        db.test_connection().await?;
        Ok(db)
    }

    /// Builds the pool without opening a connection. Connections are created
    /// on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, ApiError> {
        info!("Creating PostgreSQL connection pool for {}", config.describe());

        let pool = Self::create_pool(config)?;
        Ok(Database { pool })
    }

    fn create_pool(config: &DatabaseConfig) -> Result<Pool, ApiError> {
        let mut pg_config = Config::new();

        match &config.target {
            DatabaseTarget::Url(url) => {
                pg_config.url = Some(url.clone());
            }
            DatabaseTarget::Params { host, port, database, username, password, ssl_mode } => {
                pg_config.host = Some(host.clone());
                pg_config.port = Some(*port);
                pg_config.dbname = Some(database.clone());
                pg_config.user = Some(username.clone());
                pg_config.password = Some(password.clone());
                pg_config.ssl_mode = Some(ssl_mode.clone());
            }
        }

        pg_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(config.max_connections);
        pool_config.timeouts.wait = Some(config.connection_timeout);
        pool_config.timeouts.create = Some(config.connection_timeout);
        pool_config.timeouts.recycle = Some(config.connection_timeout);
        pg_config.pool = Some(pool_config);

        let tls_connector = TlsConnector::builder().build().map_err(|e| {
            error!("Failed to create TLS connector: {}", e);
            ApiError::Database(format!("TLS connector creation failed: {}", e))
        })?;
        let tls = MakeTlsConnector::new(tls_connector);

        pg_config.create_pool(Some(Runtime::Tokio1), tls).map_err(|e| {
            error!("Failed to create connection pool: {}", e);
            ApiError::Database(format!("Connection pool creation failed: {}", e))
        })
    }

    async fn get_connection(&self) -> Result<Object, ApiError> {
        self.pool.get().await.map_err(ApiError::from)
    }

    pub async fn test_connection(&self) -> Result<(), ApiError> {
        let client = self.get_connection().await?;

        client.execute("SELECT 1", &[]).await.map_err(|e| {
            error!("Database connection test failed: {}", e);
            ApiError::Database(format!("Connection test failed: {}", e))
        })?;

        info!("Database connection test successful");
        Ok(())
    }

    pub async fn migrate(&self) -> Result<(), ApiError> {
        info!("Running database migrations");

        let client = self.get_connection().await?;

        for (name, statement) in MIGRATIONS {
            client.batch_execute(statement).await.map_err(|e| {
                error!("Migration step '{}' failed: {}", name, e);
                ApiError::Database(format!("Migration step '{}' failed: {}", name, e))
            })?;
        }

        info!("Applied {} migration steps", MIGRATIONS.len());
        Ok(())
    }

    // User repository operations

    /// Inserts a user whose password is already hashed.
    pub async fn create_user(&self, user: User) -> Result<User, ApiError> {
        let client = self.get_connection().await?;

        let query = format!(
            "INSERT INTO users ({cols}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {cols}",
            cols = USER_COLUMNS
        );

        let row = client
            .query_one(
                &query,
                &[
                    &user.id,
                    &user.name,
                    &user.username,
                    &user.email,
                    &user.password,
                    &user.location,
                    &user.bio,
                    &user.website_url,
                    &user.created_at,
                    &user.updated_at,
                ],
            )
            .await
            .map_err(ApiError::from)?;

        let created = user_from_row(&row, 0);
        info!("Created user with id: {}", created.id);
        Ok(created)
    }

    /// Looks up a user by an already normalized email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);

        let row = client.query_opt(&query, &[&email]).await.map_err(ApiError::from)?;
        Ok(row.map(|row| user_from_row(&row, 0)))
    }

    pub async fn get_user_by_id(&self, user_id: Uuid) -> Result<User, ApiError> {
        let client = self.get_connection().await?;
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        let row = client.query_opt(&query, &[&user_id]).await.map_err(ApiError::from)?;

        row.map(|row| user_from_row(&row, 0))
            .ok_or_else(|| ApiError::not_found(format!("User with id {}", user_id)))
    }

    /// Loads the user, replaces every profile attribute and saves the row.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<User, ApiError> {
        request.validate().map_err(ApiError::Validation)?;

        let mut user = self.get_user_by_id(user_id).await?;
        user.apply_profile(request);

        let client = self.get_connection().await?;
        let query = format!(
            r#"
            UPDATE users
            SET name = $1, username = $2, email = $3, location = $4, bio = $5,
                website_url = $6, updated_at = $7
            WHERE id = $8
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let row = client
            .query_opt(
                &query,
                &[
                    &user.name,
                    &user.username,
                    &user.email,
                    &user.location,
                    &user.bio,
                    &user.website_url,
                    &user.updated_at,
                    &user.id,
                ],
            )
            .await
            .map_err(ApiError::from)?;

        let updated = row
            .map(|row| user_from_row(&row, 0))
            .ok_or_else(|| ApiError::not_found(format!("User with id {}", user_id)))?;

        info!("Updated profile for user id: {}", updated.id);
        Ok(updated)
    }

    /// The user with tweets, following, followers and favorites. Tweets
    /// reached either way are loaded once with their author, favorites and
    /// replies.
    pub async fn get_user_profile(&self, user_id: Uuid) -> Result<UserProfile, ApiError> {
        let user = self.get_user_by_id(user_id).await?;
        let client = self.get_connection().await?;

        let own_tweet_ids: Vec<Uuid> = client
            .query(
                "SELECT id FROM tweets WHERE user_id = $1 ORDER BY created_at DESC",
                &[&user_id],
            )
            .await
            .map_err(ApiError::from)?
            .iter()
            .map(|row| row.get(0))
            .collect();

        let following = self
            .related_users(
                &client,
                "JOIN followers f ON f.user_id = u.id WHERE f.follower_id = $1",
                user_id,
            )
            .await?;

        let followers = self
            .related_users(
                &client,
                "JOIN followers f ON f.follower_id = u.id WHERE f.user_id = $1",
                user_id,
            )
            .await?;

        let favorites: Vec<Favorite> = client
            .query(
                "SELECT id, user_id, tweet_id, created_at FROM favorites WHERE user_id = $1 ORDER BY created_at DESC",
                &[&user_id],
            )
            .await
            .map_err(ApiError::from)?
            .iter()
            .map(favorite_from_row)
            .collect();

        let mut tweet_ids = own_tweet_ids.clone();
        tweet_ids.extend(favorites.iter().map(|f| f.tweet_id));
        tweet_ids.sort_unstable();
        tweet_ids.dedup();

        let details = self.load_tweet_details(&client, &tweet_ids).await?;

        info!(
            "Loaded profile for user id: {} ({} tweets, {} following, {} followers, {} favorites)",
            user_id,
            own_tweet_ids.len(),
            following.len(),
            followers.len(),
            favorites.len()
        );

        Ok(UserProfile::assemble(
            user,
            &own_tweet_ids,
            following,
            followers,
            favorites,
            &details,
        ))
    }

    async fn related_users(
        &self,
        client: &Object,
        join_clause: &str,
        user_id: Uuid,
    ) -> Result<Vec<User>, ApiError> {
        let query = format!(
            "SELECT {} FROM users u {} ORDER BY f.created_at DESC",
            JOINED_USER_COLUMNS, join_clause
        );

        let rows = client.query(&query, &[&user_id]).await.map_err(ApiError::from)?;
        Ok(rows.iter().map(|row| user_from_row(row, 0)).collect())
    }

    /// Loads tweets by id along with author, favorites and replies, in three
    /// queries regardless of how many ids are requested.
    async fn load_tweet_details(
        &self,
        client: &Object,
        tweet_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, TweetDetail>, ApiError> {
        if tweet_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let ids = tweet_ids.to_vec();

        let tweet_query = format!(
            "SELECT t.id, t.user_id, t.tweet, t.created_at, t.updated_at, {} \
             FROM tweets t JOIN users u ON u.id = t.user_id WHERE t.id = ANY($1)",
            JOINED_USER_COLUMNS
        );
        let tweets: Vec<(Tweet, User)> = client
            .query(&tweet_query, &[&ids])
            .await
            .map_err(ApiError::from)?
            .iter()
            .map(|row| (tweet_from_row(row), user_from_row(row, 5)))
            .collect();

        let favorites: Vec<Favorite> = client
            .query(
                "SELECT id, user_id, tweet_id, created_at FROM favorites WHERE tweet_id = ANY($1) ORDER BY created_at DESC",
                &[&ids],
            )
            .await
            .map_err(ApiError::from)?
            .iter()
            .map(favorite_from_row)
            .collect();

        let replies: Vec<Reply> = client
            .query(
                "SELECT id, user_id, tweet_id, reply, created_at, updated_at FROM replies WHERE tweet_id = ANY($1) ORDER BY created_at ASC",
                &[&ids],
            )
            .await
            .map_err(ApiError::from)?
            .iter()
            .map(reply_from_row)
            .collect();

        Ok(assemble_tweet_details(tweets, favorites, replies))
    }

    // Tweet repository operations

    pub async fn create_tweet(
        &self,
        user_id: Uuid,
        request: CreateTweetRequest,
    ) -> Result<Tweet, ApiError> {
        request.validate().map_err(ApiError::Validation)?;

        let tweet = request.into_tweet(user_id);
        let client = self.get_connection().await?;

        let query = r#"
            INSERT INTO tweets (id, user_id, tweet, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, tweet, created_at, updated_at
        "#;

        let row = client
            .query_one(
                query,
                &[&tweet.id, &tweet.user_id, &tweet.tweet, &tweet.created_at, &tweet.updated_at],
            )
            .await
            .map_err(ApiError::from)?;

        let created = tweet_from_row(&row);
        info!("Created tweet with id: {}", created.id);
        Ok(created)
    }

    pub async fn get_tweet_detail(&self, tweet_id: &str) -> Result<TweetDetail, ApiError> {
        let id = Uuid::parse_str(tweet_id)
            .map_err(|_| ApiError::validation("Invalid tweet ID format"))?;

        let client = self.get_connection().await?;
        let mut details = self.load_tweet_details(&client, &[id]).await?;

        details
            .remove(&id)
            .ok_or_else(|| ApiError::not_found(format!("Tweet with id {}", tweet_id)))
    }
}

/// Reads the ten `USER_COLUMNS` starting at column `offset`.
fn user_from_row(row: &Row, offset: usize) -> User {
    User {
        id: row.get(offset),
        name: row.get(offset + 1),
        username: row.get(offset + 2),
        email: row.get(offset + 3),
        password: row.get(offset + 4),
        location: row.get(offset + 5),
        bio: row.get(offset + 6),
        website_url: row.get(offset + 7),
        created_at: row.get(offset + 8),
        updated_at: row.get(offset + 9),
    }
}

fn tweet_from_row(row: &Row) -> Tweet {
    Tweet {
        id: row.get(0),
        user_id: row.get(1),
        tweet: row.get(2),
        created_at: row.get(3),
        updated_at: row.get(4),
    }
}

fn favorite_from_row(row: &Row) -> Favorite {
    Favorite {
        id: row.get(0),
        user_id: row.get(1),
        tweet_id: row.get(2),
        created_at: row.get(3),
    }
}

fn reply_from_row(row: &Row) -> Reply {
    Reply {
        id: row.get(0),
        user_id: row.get(1),
        tweet_id: row.get(2),
        reply: row.get(3),
        created_at: row.get(4),
        updated_at: row.get(5),
    }
}
