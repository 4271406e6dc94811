use axum::{debug_handler, extract::{Path, State}, http::HeaderMap, response::Redirect, Json};
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::{
    auth::CurrentUser,
    db::{Toggle, UserId},
    redirect_back,
    session::flash_error,
    store::Store,
    AppError, AppResult, AppState,
};

/// Returns the target's follower count afterwards.
pub async fn add_following(store: &Store, follower_id: UserId, target_id: UserId) -> AppResult<i64> {
    if follower_id == target_id {
        return Err(AppError::SelfFollow);
    }

    match store.add_followship(follower_id, target_id).await? {
        Toggle::Applied { count } => {
            tracing::info!(follower_id, target_id, "followed user");
            Ok(count)
        }
        Toggle::Unchanged => Err(AppError::AlreadyExists(format!("already following user {target_id}"))),
        Toggle::MissingTarget => Err(AppError::NotFound(format!("user {target_id} not found"))),
    }
}

pub async fn remove_following(store: &Store, follower_id: UserId, target_id: UserId) -> AppResult<i64> {
    match store.remove_followship(follower_id, target_id).await? {
        Toggle::Applied { count } => {
            tracing::info!(follower_id, target_id, "unfollowed user");
            Ok(count)
        }
        Toggle::Unchanged | Toggle::MissingTarget => {
            Err(AppError::NotFound(format!("not following user {target_id}")))
        }
    }
}

#[debug_handler(state = AppState)]
pub(super) async fn follow(
    State(store): State<Store>,
    CurrentUser(user): CurrentUser,
    Path(target_id): Path<UserId>,
) -> AppResult<Json<Value>> {
    let count = add_following(&store, user.id, target_id).await?;
    Ok(Json(json!({ "status": "success", "followerCount": count })))
}

#[debug_handler(state = AppState)]
pub(super) async fn unfollow(
    State(store): State<Store>,
    CurrentUser(user): CurrentUser,
    Path(target_id): Path<UserId>,
) -> AppResult<Json<Value>> {
    let count = remove_following(&store, user.id, target_id).await?;
    Ok(Json(json!({ "status": "success", "followerCount": count })))
}

#[debug_handler(state = AppState)]
pub(super) async fn follow_back(
    State(store): State<Store>,
    CurrentUser(user): CurrentUser,
    session: Session,
    headers: HeaderMap,
    Path(target_id): Path<UserId>,
) -> AppResult<Redirect> {
    if let Err(err) = add_following(&store, user.id, target_id).await {
        flash_error(&session, err).await?;
    }
    Ok(redirect_back(&headers, "/users/top"))
}

#[debug_handler(state = AppState)]
pub(super) async fn unfollow_back(
    State(store): State<Store>,
    CurrentUser(user): CurrentUser,
    session: Session,
    headers: HeaderMap,
    Path(target_id): Path<UserId>,
) -> AppResult<Redirect> {
    if let Err(err) = remove_following(&store, user.id, target_id).await {
        flash_error(&session, err).await?;
    }
    Ok(redirect_back(&headers, "/users/top"))
}
