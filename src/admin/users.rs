use axum::{debug_handler, extract::{Path, State}, Json};

use crate::{
    auth::AdminUser,
    db::{User, UserId, UserSummary},
    store::Store,
    AppError, AppResult, AppState,
};

/// Flip another user's admin flag. Admins can not demote (or promote) themselves.
pub async fn toggle_admin(store: &Store, admin: &User, target_id: UserId) -> AppResult<UserSummary> {
    if admin.id == target_id {
        return Err(AppError::PermissionDenied("you can not change your own admin status".to_owned()));
    }

    let Some(mut target) = store.user_by_id(target_id).await? else {
        return Err(AppError::NotFound(format!("user {target_id} not found")));
    };
    target.is_admin = !target.is_admin;
    store.set_admin(target.id, target.is_admin).await?;

    tracing::info!(admin_id = admin.id, user_id = target.id, is_admin = target.is_admin, "admin flag toggled");
    Ok(UserSummary::from(&target))
}

#[debug_handler(state = AppState)]
pub(super) async fn list(
    State(store): State<Store>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<Vec<UserSummary>>> {
    let users = store.list_users().await?;
    Ok(Json(users.iter().map(UserSummary::from).collect()))
}

#[debug_handler(state = AppState)]
pub(super) async fn toggle(
    State(store): State<Store>,
    AdminUser(admin): AdminUser,
    Path(target_id): Path<UserId>,
) -> AppResult<Json<UserSummary>> {
    Ok(Json(toggle_admin(&store, &admin, target_id).await?))
}
