//! Admin-only endpoints. Every handler takes an [`AdminUser`](crate::auth::AdminUser),
//! so the gate runs before any of them touch the store.

mod restaurants;
mod users;

use axum::{routing::{delete, get, put}, Router};

pub use restaurants::{create_restaurant, delete_restaurant, get_restaurant, update_restaurant, RestaurantQuery};
pub use users::toggle_admin;

use crate::{comments, AppState};

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/restaurants", get(restaurants::list).post(restaurants::create))
        .route(
            "/restaurants/{id}",
            get(restaurants::show).put(restaurants::update).delete(restaurants::remove),
        )
        .route("/users", get(users::list))
        .route("/users/{id}/toggle_admin", put(users::toggle))
        .route("/comments/{id}", delete(comments::remove_comment))
}
