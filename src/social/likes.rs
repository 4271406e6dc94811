use axum::{debug_handler, extract::{Path, State}, Json};
use serde_json::{json, Value};

use crate::{
    auth::CurrentUser,
    db::{Mark, RestaurantId, UserId},
    store::Store,
    AppResult, AppState,
};

use super::set_mark;

// same at-most-once policy as favorites
pub async fn like_restaurant(store: &Store, user_id: UserId, restaurant_id: RestaurantId) -> AppResult<i64> {
    set_mark(store, Mark::Like, user_id, restaurant_id, true).await
}

pub async fn unlike_restaurant(store: &Store, user_id: UserId, restaurant_id: RestaurantId) -> AppResult<i64> {
    set_mark(store, Mark::Like, user_id, restaurant_id, false).await
}

#[debug_handler(state = AppState)]
pub(super) async fn like(
    State(store): State<Store>,
    CurrentUser(user): CurrentUser,
    Path(restaurant_id): Path<RestaurantId>,
) -> AppResult<Json<Value>> {
    let count = like_restaurant(&store, user.id, restaurant_id).await?;
    Ok(Json(json!({ "status": "success", "likeCount": count })))
}

#[debug_handler(state = AppState)]
pub(super) async fn unlike(
    State(store): State<Store>,
    CurrentUser(user): CurrentUser,
    Path(restaurant_id): Path<RestaurantId>,
) -> AppResult<Json<Value>> {
    let count = unlike_restaurant(&store, user.id, restaurant_id).await?;
    Ok(Json(json!({ "status": "success", "likeCount": count })))
}
