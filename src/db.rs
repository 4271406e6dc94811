use serde::Serialize;

pub type UserId = i64;
pub type RestaurantId = i64;

pub const DEFAULT_AVATAR: &str = "https://i.imgur.com/q6bwDGO.png";

// unique: id, email
// password holds an argon2 PHC string, never the plaintext
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: String,
    pub is_admin: bool,
}

/// Public face of a [`User`]: everything except the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub image: String,
    pub is_admin: bool,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        UserSummary {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            image: user.image.clone(),
            is_admin: user.is_admin,
        }
    }
}

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserBrief {
    pub id: UserId,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Restaurant {
    pub id: RestaurantId,
    pub name: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub user_id: UserId,
    pub restaurant_id: RestaurantId,
    pub text: String,
}

/// A comment row joined to the restaurant it was left on.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentedRestaurant {
    pub comment_id: i64,
    pub restaurant_id: RestaurantId,
    pub name: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FollowerCount {
    pub id: UserId,
    pub name: String,
    pub image: String,
    pub follower_count: i64,
}

/// Restaurant-scoped relations stored as `(user_id, restaurant_id)` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Favorite,
    Like,
}

impl Mark {
    pub(crate) fn insert_sql(&self) -> &'static str {
        match self {
            Mark::Favorite => "INSERT INTO favorites (user_id,restaurant_id) VALUES (?,?) ON CONFLICT DO NOTHING",
            Mark::Like => "INSERT INTO likes (user_id,restaurant_id) VALUES (?,?) ON CONFLICT DO NOTHING",
        }
    }

    pub(crate) fn delete_sql(&self) -> &'static str {
        match self {
            Mark::Favorite => "DELETE FROM favorites WHERE user_id=? AND restaurant_id=?",
            Mark::Like => "DELETE FROM likes WHERE user_id=? AND restaurant_id=?",
        }
    }

    pub(crate) fn count_sql(&self) -> &'static str {
        match self {
            Mark::Favorite => "SELECT COUNT(*) FROM favorites WHERE restaurant_id=?",
            Mark::Like => "SELECT COUNT(*) FROM likes WHERE restaurant_id=?",
        }
    }
}

/// Outcome of a conditional relation write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    /// The row was created or deleted; carries the target's new count.
    Applied { count: i64 },
    /// The row already existed (insert) or was already gone (delete).
    Unchanged,
    /// The restaurant or user on the far side of the edge does not exist.
    MissingTarget,
}
