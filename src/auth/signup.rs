use std::sync::LazyLock;

use axum::{debug_handler, extract::State, response::Redirect, Form, Json};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::{
    db::{NewUser, User},
    session::{flash_error, push_flash, FlashLevel},
    store::Store,
    AppError, AppResult,
};

use super::password;

pub const MAX_NAME_LEN: usize = 25;

static EMAIL_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9_]+((-[A-Za-z0-9_]+)|(\.[A-Za-z0-9_]+)|(\+[A-Za-z0-9_]+))*@[A-Za-z0-9]+((\.|-)[A-Za-z0-9]+)*\.[A-Za-z]+$",
    )
    .expect("email pattern is valid")
});

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RULE.is_match(email)
}

/// Every problem with the form, not just the first one found.
pub fn validate(form: &SignUpForm) -> Vec<String> {
    let mut errors = Vec::new();

    if form.name.is_empty() || form.email.is_empty() || form.password.is_empty() || form.confirm_password.is_empty() {
        errors.push("all fields required".to_owned());
    }
    if !is_valid_email(&form.email) {
        errors.push("invalid email".to_owned());
    }
    if form.password != form.confirm_password {
        errors.push("password mismatch".to_owned());
    }
    if form.name.chars().count() > MAX_NAME_LEN {
        errors.push(format!("name can not be longer than {MAX_NAME_LEN} characters"));
    }

    errors
}

pub async fn sign_up(store: &Store, form: &SignUpForm) -> AppResult<User> {
    let errors = validate(form);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    if store.user_by_email(&form.email).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "a user with {} already exists, choose a different address or sign in",
            form.email
        )));
    }

    let password_hash = password::hash(&form.password)?;
    let user = store
        .insert_user(NewUser {
            name: &form.name,
            email: &form.email,
            password_hash: &password_hash,
        })
        .await?;

    tracing::info!(user_id = user.id, "registered new user");
    Ok(user)
}

#[debug_handler]
pub(crate) async fn signup(
    State(store): State<Store>,
    session: Session,
    Form(form): Form<SignUpForm>,
) -> AppResult<Redirect> {
    match sign_up(&store, &form).await {
        Ok(user) => {
            push_flash(&session, FlashLevel::Success, format!("{} registered successfully! Please sign in.", user.email)).await?;
            Ok(Redirect::to("/signin"))
        }
        Err(err) => {
            flash_error(&session, err).await?;
            Ok(Redirect::to("/signup"))
        }
    }
}

#[debug_handler]
pub(crate) async fn api_signup(
    State(store): State<Store>,
    Json(form): Json<SignUpForm>,
) -> AppResult<Json<Value>> {
    let user = sign_up(&store, &form).await?;
    Ok(Json(json!({
        "status": "success",
        "message": format!("{} registered successfully! Please sign in.", user.email),
    })))
}
