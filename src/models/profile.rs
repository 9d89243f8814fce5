use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use super::tweet::{Favorite, Reply, Tweet, TweetDetail};
use super::user::User;

/// A favorite together with the tweet it points at.
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteDetail {
    #[serde(flatten)]
    pub favorite: Favorite,
    pub tweet: TweetDetail,
}

/// Payload of `GET /account/me`: the user plus every relation the client
/// renders on the profile page.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub tweets: Vec<TweetDetail>,
    pub following: Vec<User>,
    pub followers: Vec<User>,
    pub favorites: Vec<FavoriteDetail>,
}

/// Groups favorites and replies under their tweets. Input order is kept
/// inside each group, so callers sort the rows before passing them in.
pub fn assemble_tweet_details(
    tweets: Vec<(Tweet, User)>,
    favorites: Vec<Favorite>,
    replies: Vec<Reply>,
) -> HashMap<Uuid, TweetDetail> {
    let mut details: HashMap<Uuid, TweetDetail> = tweets
        .into_iter()
        .map(|(tweet, user)| {
            let detail = TweetDetail {
                tweet,
                user,
                favorites: Vec::new(),
                replies: Vec::new(),
            };
            (detail.tweet.id, detail)
        })
        .collect();

    for favorite in favorites {
        if let Some(detail) = details.get_mut(&favorite.tweet_id) {
            detail.favorites.push(favorite);
        }
    }

    for reply in replies {
        if let Some(detail) = details.get_mut(&reply.tweet_id) {
            detail.replies.push(reply);
        }
    }

    details
}

impl UserProfile {
    /// Builds the profile from independently loaded rows. `own_tweet_ids` and
    /// `favorites` decide ordering; tweets missing from `details` are skipped.
    pub fn assemble(
        user: User,
        own_tweet_ids: &[Uuid],
        following: Vec<User>,
        followers: Vec<User>,
        favorites: Vec<Favorite>,
        details: &HashMap<Uuid, TweetDetail>,
    ) -> Self {
        let tweets = own_tweet_ids
            .iter()
            .filter_map(|id| details.get(id).cloned())
            .collect();

        let favorites = favorites
            .into_iter()
            .filter_map(|favorite| {
                let tweet = details.get(&favorite.tweet_id)?.clone();
                Some(FavoriteDetail { favorite, tweet })
            })
            .collect();

        UserProfile {
            user,
            tweets,
            following,
            followers,
            favorites,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(username: &str) -> User {
        User::new(
            username.to_string(),
            username.to_string(),
            format!("{}@example.com", username),
            "hash".to_string(),
        )
    }

    fn favorite(user_id: Uuid, tweet_id: Uuid) -> Favorite {
        Favorite {
            id: Uuid::new_v4(),
            user_id,
            tweet_id,
            created_at: Utc::now(),
        }
    }

    fn reply(user_id: Uuid, tweet_id: Uuid, text: &str) -> Reply {
        let now = Utc::now();
        Reply {
            id: Uuid::new_v4(),
            user_id,
            tweet_id,
            reply: text.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_relations_are_grouped_per_tweet() {
        let ada = user("ada");
        let bob = user("bob");
        let first = Tweet::new(ada.id, "first".to_string());
        let second = Tweet::new(bob.id, "second".to_string());

        let details = assemble_tweet_details(
            vec![(first.clone(), ada.clone()), (second.clone(), bob.clone())],
            vec![favorite(bob.id, first.id), favorite(ada.id, second.id)],
            vec![
                reply(bob.id, first.id, "nice"),
                reply(ada.id, first.id, "thanks"),
                reply(ada.id, Uuid::new_v4(), "orphan"),
            ],
        );

        let first_detail = &details[&first.id];
        assert_eq!(first_detail.user.username, "ada");
        assert_eq!(first_detail.favorites.len(), 1);
        assert_eq!(
            first_detail.replies.iter().map(|r| r.reply.as_str()).collect::<Vec<_>>(),
            vec!["nice", "thanks"]
        );

        let second_detail = &details[&second.id];
        assert_eq!(second_detail.user.username, "bob");
        assert_eq!(second_detail.favorites[0].user_id, ada.id);
        assert!(second_detail.replies.is_empty());
    }

    #[test]
    fn test_profile_keeps_order_and_shares_tweets() {
        let ada = user("ada");
        let bob = user("bob");
        let older = Tweet::new(ada.id, "older".to_string());
        let newer = Tweet::new(ada.id, "newer".to_string());
        let bobs = Tweet::new(bob.id, "bob's".to_string());

        let faves = vec![favorite(ada.id, bobs.id), favorite(ada.id, newer.id)];
        let details = assemble_tweet_details(
            vec![
                (older.clone(), ada.clone()),
                (newer.clone(), ada.clone()),
                (bobs.clone(), bob.clone()),
            ],
            faves.clone(),
            Vec::new(),
        );

        let profile = UserProfile::assemble(
            ada.clone(),
            &[newer.id, older.id],
            vec![bob.clone()],
            Vec::new(),
            faves,
            &details,
        );

        let tweet_texts: Vec<_> = profile.tweets.iter().map(|t| t.tweet.tweet.as_str()).collect();
        assert_eq!(tweet_texts, vec!["newer", "older"]);
        assert_eq!(profile.tweets[0].favorites.len(), 1);

        let favorite_texts: Vec<_> = profile
            .favorites
            .iter()
            .map(|f| f.tweet.tweet.tweet.as_str())
            .collect();
        assert_eq!(favorite_texts, vec!["bob's", "newer"]);
        assert_eq!(profile.favorites[0].tweet.user.username, "bob");
        assert_eq!(profile.following[0].id, bob.id);
    }

    #[test]
    fn test_profile_serialization_shape() {
        let ada = user("ada");
        let profile = UserProfile::assemble(
            ada.clone(),
            &[],
            Vec::new(),
            Vec::new(),
            Vec::new(),
            &HashMap::new(),
        );

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["id"], ada.id.to_string());
        assert_eq!(json["email"], "ada@example.com");
        assert!(json.get("password").is_none());
        for relation in ["tweets", "following", "followers", "favorites"] {
            assert_eq!(json[relation], serde_json::json!([]), "{}", relation);
        }
    }
}
