use axum::{debug_handler, extract::{Path, State}, Json};
use serde_json::{json, Value};

use crate::{
    auth::CurrentUser,
    db::{Mark, RestaurantId, UserId},
    store::Store,
    AppResult, AppState,
};

use super::set_mark;

/// Returns how many users have the restaurant in their favorites afterwards.
pub async fn add_favorite(store: &Store, user_id: UserId, restaurant_id: RestaurantId) -> AppResult<i64> {
    set_mark(store, Mark::Favorite, user_id, restaurant_id, true).await
}

pub async fn remove_favorite(store: &Store, user_id: UserId, restaurant_id: RestaurantId) -> AppResult<i64> {
    set_mark(store, Mark::Favorite, user_id, restaurant_id, false).await
}

#[debug_handler(state = AppState)]
pub(super) async fn add(
    State(store): State<Store>,
    CurrentUser(user): CurrentUser,
    Path(restaurant_id): Path<RestaurantId>,
) -> AppResult<Json<Value>> {
    let count = add_favorite(&store, user.id, restaurant_id).await?;
    Ok(Json(json!({ "status": "success", "favCount": count })))
}

#[debug_handler(state = AppState)]
pub(super) async fn remove(
    State(store): State<Store>,
    CurrentUser(user): CurrentUser,
    Path(restaurant_id): Path<RestaurantId>,
) -> AppResult<Json<Value>> {
    let count = remove_favorite(&store, user.id, restaurant_id).await?;
    Ok(Json(json!({ "status": "success", "favCount": count })))
}
