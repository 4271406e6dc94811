use axum::{debug_handler, extract::State, response::Redirect, Form, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    db::{User, UserSummary},
    session::{flash_error, push_flash, FlashLevel, USER_ID},
    store::Store,
    AppError, AppResult,
};

use super::{password, TokenKeys};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub token: String,
    pub user: UserSummary,
}

/// Check an email/password pair against the stored hash.
///
/// Unknown emails and wrong passwords are indistinguishable to the caller.
pub async fn authenticate(store: &Store, email: &str, password: &str) -> AppResult<User> {
    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("all fields required"));
    }

    let Some(user) = store.user_by_email(email).await? else {
        tracing::debug!("sign-in for unregistered email");
        return Err(AppError::InvalidCredentials);
    };
    if !password::verify(password, &user.password) {
        tracing::debug!(user_id = user.id, "sign-in with wrong password");
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

#[debug_handler]
pub(crate) async fn signin(
    State(store): State<Store>,
    session: Session,
    Form(SignInForm { email, password }): Form<SignInForm>,
) -> AppResult<Redirect> {
    match authenticate(&store, &email, &password).await {
        Ok(user) => {
            // fresh id on privilege change
            session.cycle_id().await?;
            session.insert(USER_ID, user.id).await?;
            push_flash(&session, FlashLevel::Success, "Login successfully!").await?;
            tracing::info!(user_id = user.id, "signed in");
            Ok(Redirect::to("/"))
        }
        Err(err) => {
            flash_error(&session, err).await?;
            Ok(Redirect::to("/signin"))
        }
    }
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn api_signin(
    State(store): State<Store>,
    State(tokens): State<TokenKeys>,
    Json(SignInForm { email, password }): Json<SignInForm>,
) -> AppResult<Json<TokenResponse>> {
    let user = authenticate(&store, &email, &password).await?;
    let token = tokens.issue(user.id)?;
    tracing::info!(user_id = user.id, "issued api token");

    Ok(Json(TokenResponse {
        status: "success",
        message: "ok",
        token,
        user: UserSummary::from(&user),
    }))
}
