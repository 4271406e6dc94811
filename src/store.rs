//! Typed repository over the SQLite pool.
//!
//! Every query the application runs lives here. Relation writes run inside a
//! transaction whose first statement is the write itself, so the uniqueness
//! constraints in `migrations/` decide races between identical requests.

use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Sqlite, SqlitePool, Transaction,
};

use crate::{
    db::{
        Comment, CommentedRestaurant, FollowerCount, Mark, NewUser, Restaurant, RestaurantId,
        Toggle, User, UserBrief, UserId, DEFAULT_AVATAR,
    },
    AppError, AppResult,
};

const USER_COLUMNS: &str = "SELECT id,name,email,password,image,is_admin FROM users";

#[derive(Clone)]
pub struct Store {
    db_pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database at `url` and run migrations.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Store> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let db_pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        sqlx::migrate!().run(&db_pool).await?;
        Ok(Store { db_pool })
    }

    /// A private migrated database living as long as the returned store.
    pub async fn in_memory() -> anyhow::Result<Store> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        // one connection that never recycles, otherwise the database vanishes
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!().run(&db_pool).await?;
        Ok(Store { db_pool })
    }

    // users

    pub async fn user_by_id(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>(&format!("{USER_COLUMNS} WHERE id=?"))
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?
        )
    }

    pub async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>(&format!("{USER_COLUMNS} WHERE email=?"))
                .bind(email)
                .fetch_optional(&self.db_pool)
                .await?
        )
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(
            sqlx::query_as::<_, User>(&format!("{USER_COLUMNS} ORDER BY id"))
                .fetch_all(&self.db_pool)
                .await?
        )
    }

    /// Insert a user; a taken email surfaces as [`AppError::Conflict`] even
    /// when two sign-ups race past the application-level check.
    pub async fn insert_user(&self, new_user: NewUser<'_>) -> AppResult<User> {
        let result = sqlx::query("INSERT INTO users (name,email,password,image) VALUES (?,?,?,?)")
            .bind(new_user.name)
            .bind(new_user.email)
            .bind(new_user.password_hash)
            .bind(DEFAULT_AVATAR)
            .execute(&self.db_pool)
            .await;

        match result {
            Ok(done) => {
                let id = done.last_insert_rowid();
                self.user_by_id(id)
                    .await?
                    .ok_or_else(|| AppError::from(format!("user {id} vanished after insert")))
            }
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Err(
                AppError::Conflict(format!("a user with {} already exists", new_user.email))
            ),
            Err(err) => Err(err.into()),
        }
    }

    /// Name and image are written by one statement so they change together.
    /// Without a new image the stored one is left as it is.
    pub async fn update_profile(&self, id: UserId, name: &str, image: Option<&str>) -> AppResult<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>(
                "UPDATE users SET name=?,image=COALESCE(?,image) WHERE id=? \
                 RETURNING id,name,email,password,image,is_admin",
            )
            .bind(name)
            .bind(image)
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?
        )
    }

    pub async fn set_admin(&self, id: UserId, is_admin: bool) -> AppResult<bool> {
        let done = sqlx::query("UPDATE users SET is_admin=? WHERE id=?")
            .bind(is_admin)
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        Ok(done.rows_affected() == 1)
    }

    // restaurants

    pub async fn restaurant_by_id(&self, id: RestaurantId) -> AppResult<Option<Restaurant>> {
        Ok(
            sqlx::query_as::<_, Restaurant>("SELECT id,name,image FROM restaurants WHERE id=?")
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?
        )
    }

    pub async fn list_restaurants(&self) -> AppResult<Vec<Restaurant>> {
        Ok(
            sqlx::query_as::<_, Restaurant>("SELECT id,name,image FROM restaurants ORDER BY id DESC")
                .fetch_all(&self.db_pool)
                .await?
        )
    }

    pub async fn insert_restaurant(&self, name: &str, image: Option<&str>) -> AppResult<Restaurant> {
        let id = sqlx::query("INSERT INTO restaurants (name,image) VALUES (?,?)")
            .bind(name)
            .bind(image)
            .execute(&self.db_pool)
            .await?
            .last_insert_rowid();
        Ok(Restaurant {
            id,
            name: name.to_owned(),
            image: image.map(str::to_owned),
        })
    }

    pub async fn update_restaurant(
        &self,
        id: RestaurantId,
        name: &str,
        image: Option<&str>,
    ) -> AppResult<Option<Restaurant>> {
        Ok(
            sqlx::query_as::<_, Restaurant>("UPDATE restaurants SET name=?,image=? WHERE id=? RETURNING id,name,image")
                .bind(name)
                .bind(image)
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?
        )
    }

    /// Comments, favorites and likes on the restaurant go with it.
    pub async fn delete_restaurant(&self, id: RestaurantId) -> AppResult<bool> {
        let done = sqlx::query("DELETE FROM restaurants WHERE id=?")
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        Ok(done.rows_affected() == 1)
    }

    // comments

    pub async fn insert_comment(
        &self,
        user_id: UserId,
        restaurant_id: RestaurantId,
        text: &str,
    ) -> AppResult<Option<Comment>> {
        let result = sqlx::query("INSERT INTO comments (user_id,restaurant_id,text) VALUES (?,?,?)")
            .bind(user_id)
            .bind(restaurant_id)
            .bind(text)
            .execute(&self.db_pool)
            .await;

        match result {
            Ok(done) => Ok(Some(Comment {
                id: done.last_insert_rowid(),
                user_id,
                restaurant_id,
                text: text.to_owned(),
            })),
            Err(sqlx::Error::Database(err)) if err.is_foreign_key_violation() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn delete_comment(&self, id: i64) -> AppResult<bool> {
        let done = sqlx::query("DELETE FROM comments WHERE id=?")
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        Ok(done.rows_affected() == 1)
    }

    /// Every comment by `user_id` with its restaurant, oldest comment first.
    pub async fn commented_restaurants(&self, user_id: UserId) -> AppResult<Vec<CommentedRestaurant>> {
        Ok(
            sqlx::query_as::<_, CommentedRestaurant>(
                "SELECT c.id AS comment_id, r.id AS restaurant_id, r.name, r.image \
                 FROM comments c JOIN restaurants r ON r.id=c.restaurant_id \
                 WHERE c.user_id=? ORDER BY c.id",
            )
            .bind(user_id)
            .fetch_all(&self.db_pool)
            .await?
        )
    }

    // favorites & likes

    pub async fn add_mark(&self, mark: Mark, user_id: UserId, restaurant_id: RestaurantId) -> AppResult<Toggle> {
        let mut tx = self.db_pool.begin().await?;

        let result = sqlx::query(mark.insert_sql())
            .bind(user_id)
            .bind(restaurant_id)
            .execute(&mut *tx)
            .await;
        match result {
            Ok(done) if done.rows_affected() == 0 => return Ok(Toggle::Unchanged),
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_foreign_key_violation() => {
                return Ok(Toggle::MissingTarget);
            }
            Err(err) => return Err(err.into()),
        }

        let count = count_in(&mut tx, mark.count_sql(), restaurant_id).await?;
        tx.commit().await?;
        Ok(Toggle::Applied { count })
    }

    pub async fn remove_mark(&self, mark: Mark, user_id: UserId, restaurant_id: RestaurantId) -> AppResult<Toggle> {
        let mut tx = self.db_pool.begin().await?;

        let done = sqlx::query(mark.delete_sql())
            .bind(user_id)
            .bind(restaurant_id)
            .execute(&mut *tx)
            .await?;
        if done.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM restaurants WHERE id=?")
                .bind(restaurant_id)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();
            return Ok(if exists { Toggle::Unchanged } else { Toggle::MissingTarget });
        }

        let count = count_in(&mut tx, mark.count_sql(), restaurant_id).await?;
        tx.commit().await?;
        Ok(Toggle::Applied { count })
    }

    pub async fn favorited_restaurants(&self, user_id: UserId) -> AppResult<Vec<Restaurant>> {
        Ok(
            sqlx::query_as::<_, Restaurant>(
                "SELECT r.id, r.name, r.image FROM favorites f JOIN restaurants r ON r.id=f.restaurant_id \
                 WHERE f.user_id=? ORDER BY f.id",
            )
            .bind(user_id)
            .fetch_all(&self.db_pool)
            .await?
        )
    }

    pub async fn mark_count(&self, mark: Mark, restaurant_id: RestaurantId) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as(mark.count_sql())
            .bind(restaurant_id)
            .fetch_one(&self.db_pool)
            .await?;
        Ok(count)
    }

    // followships

    /// `follower_id == following_id` is rejected by a CHECK constraint; callers
    /// are expected to have turned that case away already.
    pub async fn add_followship(&self, follower_id: UserId, following_id: UserId) -> AppResult<Toggle> {
        let mut tx = self.db_pool.begin().await?;

        let result = sqlx::query("INSERT INTO followships (follower_id,following_id) VALUES (?,?) ON CONFLICT DO NOTHING")
            .bind(follower_id)
            .bind(following_id)
            .execute(&mut *tx)
            .await;
        match result {
            Ok(done) if done.rows_affected() == 0 => return Ok(Toggle::Unchanged),
            Ok(_) => {}
            Err(sqlx::Error::Database(err)) if err.is_foreign_key_violation() => {
                return Ok(Toggle::MissingTarget);
            }
            Err(err) => return Err(err.into()),
        }

        let count = count_in(&mut tx, FOLLOWER_COUNT_SQL, following_id).await?;
        tx.commit().await?;
        Ok(Toggle::Applied { count })
    }

    pub async fn remove_followship(&self, follower_id: UserId, following_id: UserId) -> AppResult<Toggle> {
        let mut tx = self.db_pool.begin().await?;

        let done = sqlx::query("DELETE FROM followships WHERE follower_id=? AND following_id=?")
            .bind(follower_id)
            .bind(following_id)
            .execute(&mut *tx)
            .await?;
        if done.rows_affected() == 0 {
            return Ok(Toggle::Unchanged);
        }

        let count = count_in(&mut tx, FOLLOWER_COUNT_SQL, following_id).await?;
        tx.commit().await?;
        Ok(Toggle::Applied { count })
    }

    pub async fn followers_of(&self, user_id: UserId) -> AppResult<Vec<UserBrief>> {
        Ok(
            sqlx::query_as::<_, UserBrief>(
                "SELECT u.id, u.image FROM followships f JOIN users u ON u.id=f.follower_id \
                 WHERE f.following_id=? ORDER BY f.id",
            )
            .bind(user_id)
            .fetch_all(&self.db_pool)
            .await?
        )
    }

    pub async fn followings_of(&self, user_id: UserId) -> AppResult<Vec<UserBrief>> {
        Ok(
            sqlx::query_as::<_, UserBrief>(
                "SELECT u.id, u.image FROM followships f JOIN users u ON u.id=f.following_id \
                 WHERE f.follower_id=? ORDER BY f.id",
            )
            .bind(user_id)
            .fetch_all(&self.db_pool)
            .await?
        )
    }

    pub async fn following_ids(&self, user_id: UserId) -> AppResult<Vec<UserId>> {
        let rows: Vec<(UserId,)> = sqlx::query_as("SELECT following_id FROM followships WHERE follower_id=?")
            .bind(user_id)
            .fetch_all(&self.db_pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn follower_counts(&self) -> AppResult<Vec<FollowerCount>> {
        Ok(
            sqlx::query_as::<_, FollowerCount>(
                "SELECT u.id, u.name, u.image, COUNT(f.id) AS follower_count \
                 FROM users u LEFT JOIN followships f ON f.following_id=u.id \
                 GROUP BY u.id, u.name, u.image",
            )
            .fetch_all(&self.db_pool)
            .await?
        )
    }
}

const FOLLOWER_COUNT_SQL: &str = "SELECT COUNT(*) FROM followships WHERE following_id=?";

async fn count_in(tx: &mut Transaction<'_, Sqlite>, sql: &'static str, id: i64) -> AppResult<i64> {
    let (count,): (i64,) = sqlx::query_as(sql)
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(count)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A file-backed store with a real connection pool, for tests that need
    /// requests to actually run side by side inside SQLite.
    pub(crate) async fn pooled_store(dir: &tempfile::TempDir) -> Store {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("dinebook.db").display());
        Store::connect(&url, 8).await.expect("open pooled store")
    }

    pub(crate) async fn seeded_user(store: &Store, name: &str) -> User {
        store
            .insert_user(NewUser {
                name,
                email: &format!("{}@example.com", name.to_lowercase()),
                password_hash: "not-a-real-hash",
            })
            .await
            .expect("insert user")
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = Store::in_memory().await.unwrap();
        seeded_user(&store, "Alice").await;

        let err = store
            .insert_user(NewUser {
                name: "Other",
                email: "alice@example.com",
                password_hash: "x",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn new_users_get_the_default_avatar() {
        let store = Store::in_memory().await.unwrap();
        let user = seeded_user(&store, "Bob").await;
        assert_eq!(user.image, DEFAULT_AVATAR);
        assert!(!user.is_admin);
    }

    #[tokio::test]
    async fn mark_rows_are_unique_per_pair() {
        let store = Store::in_memory().await.unwrap();
        let user = seeded_user(&store, "Carol").await;
        let restaurant = store.insert_restaurant("Noodle Bar", None).await.unwrap();

        let first = store.add_mark(Mark::Like, user.id, restaurant.id).await.unwrap();
        let second = store.add_mark(Mark::Like, user.id, restaurant.id).await.unwrap();
        assert_eq!(first, Toggle::Applied { count: 1 });
        assert_eq!(second, Toggle::Unchanged);
        assert_eq!(store.mark_count(Mark::Like, restaurant.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn mark_on_missing_restaurant_is_reported() {
        let store = Store::in_memory().await.unwrap();
        let user = seeded_user(&store, "Dan").await;

        assert_eq!(store.add_mark(Mark::Favorite, user.id, 404).await.unwrap(), Toggle::MissingTarget);
        assert_eq!(store.remove_mark(Mark::Favorite, user.id, 404).await.unwrap(), Toggle::MissingTarget);
    }

    #[tokio::test]
    async fn self_followship_violates_the_check_constraint() {
        let store = Store::in_memory().await.unwrap();
        let user = seeded_user(&store, "Eve").await;
        assert!(store.add_followship(user.id, user.id).await.is_err());
        assert!(store.followers_of(user.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn follower_counts_include_users_without_followers() {
        let store = Store::in_memory().await.unwrap();
        let a = seeded_user(&store, "Ann").await;
        let b = seeded_user(&store, "Ben").await;
        store.add_followship(a.id, b.id).await.unwrap();

        let mut counts = store.follower_counts().await.unwrap();
        counts.sort_by_key(|row| row.id);
        let pairs: Vec<_> = counts.iter().map(|row| (row.id, row.follower_count)).collect();
        assert_eq!(pairs, vec![(a.id, 0), (b.id, 1)]);
    }
}
