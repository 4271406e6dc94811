use axum::{debug_handler, response::Redirect};
use tower_sessions::Session;

use crate::{db::UserId, session::USER_ID, AppResult};

#[debug_handler]
pub async fn index(session: Session) -> AppResult<Redirect> {
    if session.get::<UserId>(USER_ID).await?.is_some() {
        Ok(Redirect::to("/users/top"))
    } else {
        Ok(Redirect::to("/signin"))
    }
}
