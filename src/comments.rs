use axum::{debug_handler, extract::{Path, State}, routing::post, Json, Router};
use serde::Deserialize;

use crate::{
    auth::{AdminUser, CurrentUser},
    db::{Comment, RestaurantId, UserId},
    store::Store,
    AppError, AppResult, AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCommentQuery {
    pub restaurant_id: RestaurantId,
    #[serde(default)]
    pub text: String,
}

pub async fn post_comment(store: &Store, user_id: UserId, restaurant_id: RestaurantId, text: &str) -> AppResult<Comment> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::validation("comment can not be empty"));
    }

    let comment = store
        .insert_comment(user_id, restaurant_id, text)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("restaurant {restaurant_id} not found")))?;
    tracing::info!(user_id, restaurant_id, comment_id = comment.id, "comment posted");
    Ok(comment)
}

pub async fn delete_comment(store: &Store, comment_id: i64) -> AppResult<()> {
    if !store.delete_comment(comment_id).await? {
        return Err(AppError::NotFound(format!("comment {comment_id} not found")));
    }
    Ok(())
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_comment(
    State(store): State<Store>,
    CurrentUser(user): CurrentUser,
    Json(PostCommentQuery { restaurant_id, text }): Json<PostCommentQuery>,
) -> AppResult<Json<Comment>> {
    Ok(Json(post_comment(&store, user.id, restaurant_id, &text).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn remove_comment(
    State(store): State<Store>,
    AdminUser(admin): AdminUser,
    Path(comment_id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    delete_comment(&store, comment_id).await?;
    tracing::info!(admin_id = admin.id, comment_id, "comment deleted");
    Ok(Json(serde_json::json!({ "status": "success" })))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(new_comment))
}
