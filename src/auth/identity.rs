//! Resolving a request to the user behind it.
//!
//! Browser flows carry a session cookie, API clients a bearer token. Each is an
//! [`IdentityStrategy`]; handlers only ever see the resulting [`CurrentUser`]
//! or [`AdminUser`].

use std::future::Future;

use axum::{
    debug_handler,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    Json,
};
use tower_sessions::Session;

use crate::{
    db::{User, UserId, UserSummary},
    session::USER_ID,
    AppError, AppResult, AppState,
};

pub trait IdentityStrategy {
    /// The user id this request authenticates as, if the strategy applies.
    fn resolve(&self, parts: &Parts, state: &AppState) -> impl Future<Output = AppResult<Option<UserId>>> + Send;
}

/// Reads the user id stored in the server-side session at sign-in.
pub struct SessionStrategy;

impl IdentityStrategy for SessionStrategy {
    async fn resolve(&self, parts: &Parts, _state: &AppState) -> AppResult<Option<UserId>> {
        let Some(session) = parts.extensions.get::<Session>() else {
            return Ok(None);
        };
        Ok(session.get::<UserId>(USER_ID).await?)
    }
}

/// Reads `Authorization: Bearer <jwt>` issued by the API sign-in.
pub struct BearerStrategy;

impl IdentityStrategy for BearerStrategy {
    async fn resolve(&self, parts: &Parts, state: &AppState) -> AppResult<Option<UserId>> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(None);
        };
        let token = header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);
        Ok(token.and_then(|token| state.tokens.verify(token)))
    }
}

pub async fn resolve_user_id(parts: &Parts, state: &AppState) -> AppResult<Option<UserId>> {
    if let Some(user_id) = SessionStrategy.resolve(parts, state).await? {
        return Ok(Some(user_id));
    }
    BearerStrategy.resolve(parts, state).await
}

/// The authenticated requester, loaded fresh from the store.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(user_id) = resolve_user_id(parts, state).await? else {
            return Err(AppError::Unauthenticated);
        };
        match state.store.user_by_id(user_id).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                tracing::warn!(user_id, "identity refers to a user that no longer exists");
                Err(AppError::Unauthenticated)
            }
        }
    }
}

/// A [`CurrentUser`] that passed the admin gate.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

pub fn require_admin(user: Option<&User>) -> AppResult<()> {
    match user {
        Some(user) if user.is_admin => Ok(()),
        _ => Err(AppError::permission_denied()),
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = match CurrentUser::from_request_parts(parts, state).await {
            Ok(CurrentUser(user)) => Some(user),
            Err(AppError::Unauthenticated) => None,
            Err(err) => return Err(err),
        };
        require_admin(user.as_ref())?;
        user.map(AdminUser).ok_or_else(AppError::permission_denied)
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn current_user(CurrentUser(user): CurrentUser) -> Json<UserSummary> {
    Json(UserSummary::from(&user))
}
