//! Favorites, likes and followships.
//!
//! Every write is conditional: creating a relation that already exists is
//! [`AppError::AlreadyExists`], removing one that does not is
//! [`AppError::NotFound`]. Neither case touches the stored counts.

mod favorites;
mod follows;
mod likes;

use axum::{routing::post, Router};

pub use favorites::{add_favorite, remove_favorite};
pub use follows::{add_following, remove_following};
pub use likes::{like_restaurant, unlike_restaurant};

use crate::{
    db::{Mark, RestaurantId, Toggle, UserId},
    store::Store,
    AppError, AppResult, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/favorite/{restaurant_id}", post(favorites::add).delete(favorites::remove))
        .route("/like/{restaurant_id}", post(likes::like).delete(likes::unlike))
        .route("/following/{user_id}", post(follows::follow_back).delete(follows::unfollow_back))
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/favorite/{restaurant_id}", post(favorites::add).delete(favorites::remove))
        .route("/like/{restaurant_id}", post(likes::like).delete(likes::unlike))
        .route("/following/{user_id}", post(follows::follow).delete(follows::unfollow))
}

struct MarkWording {
    present: &'static str,
    absent: &'static str,
}

fn wording(mark: Mark) -> MarkWording {
    match mark {
        Mark::Favorite => MarkWording {
            present: "already in favorite list",
            absent: "not in favorite list",
        },
        Mark::Like => MarkWording {
            present: "already liked",
            absent: "not liked",
        },
    }
}

async fn set_mark(store: &Store, mark: Mark, user_id: UserId, restaurant_id: RestaurantId, on: bool) -> AppResult<i64> {
    let toggle = if on {
        store.add_mark(mark, user_id, restaurant_id).await?
    } else {
        store.remove_mark(mark, user_id, restaurant_id).await?
    };

    match toggle {
        Toggle::Applied { count } => {
            tracing::info!(user_id, restaurant_id, ?mark, on, count, "restaurant mark changed");
            Ok(count)
        }
        Toggle::Unchanged if on => Err(AppError::AlreadyExists(wording(mark).present.to_owned())),
        Toggle::Unchanged => Err(AppError::NotFound(wording(mark).absent.to_owned())),
        Toggle::MissingTarget => Err(AppError::NotFound(format!("restaurant {restaurant_id} not found"))),
    }
}
