use std::{cmp::Reverse, collections::HashSet};

use axum::{debug_handler, extract::State, Json};
use serde::Serialize;

use crate::{
    auth::CurrentUser,
    db::{FollowerCount, UserId},
    store::Store,
    AppResult, AppState,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUser {
    pub id: UserId,
    pub name: String,
    pub image: String,
    pub follower_count: i64,
    pub is_followed: bool,
}

/// Most followed first; equal counts fall back to the older account.
pub fn rank(rows: Vec<FollowerCount>, viewer_follows: &HashSet<UserId>) -> Vec<TopUser> {
    let mut users: Vec<TopUser> = rows
        .into_iter()
        .map(|row| TopUser {
            is_followed: viewer_follows.contains(&row.id),
            id: row.id,
            name: row.name,
            image: row.image,
            follower_count: row.follower_count,
        })
        .collect();
    users.sort_by_key(|user| (Reverse(user.follower_count), user.id));
    users
}

// Loads every user; there is no paging.
pub async fn get_top_users(store: &Store, viewer_id: UserId) -> AppResult<Vec<TopUser>> {
    let viewer_follows: HashSet<UserId> = store.following_ids(viewer_id).await?.into_iter().collect();
    Ok(rank(store.follower_counts().await?, &viewer_follows))
}

#[debug_handler(state = AppState)]
pub(crate) async fn top_users(
    State(store): State<Store>,
    CurrentUser(viewer): CurrentUser,
) -> AppResult<Json<Vec<TopUser>>> {
    Ok(Json(get_top_users(&store, viewer.id).await?))
}
