use axum::{routing::{get, post}, Router};

mod identity;
mod logout;
pub mod password;
mod signin;
pub mod signup;
mod token;

pub use identity::{require_admin, resolve_user_id, AdminUser, BearerStrategy, CurrentUser, IdentityStrategy, SessionStrategy};
pub use signin::{authenticate, SignInForm, TokenResponse};
pub use signup::{sign_up, SignUpForm};
pub use token::{Claims, TokenKeys};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup::signup))
        .route("/signin", post(signin::signin))
        .route("/logout", get(logout::logout))
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup::api_signup))
        .route("/signin", post(signin::api_signin))
        .route("/get_current_user", get(identity::current_user))
}
