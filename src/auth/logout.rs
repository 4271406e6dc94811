use axum::{debug_handler, extract::Query, response::Redirect};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{session::{push_flash, FlashLevel}, AppResult};

#[derive(Deserialize)]
pub(crate) struct LogoutQuery {
    pub(crate) return_url: Option<String>,
}

#[debug_handler]
pub(crate) async fn logout(
    Query(LogoutQuery { return_url }): Query<LogoutQuery>,
    session: Session
) -> AppResult<Redirect> {
    session.clear().await;
    push_flash(&session, FlashLevel::Success, "Logout successfully!").await?;

    // only local paths, never an open redirect
    let return_url = return_url
        .filter(|url| url.starts_with('/') && !url.starts_with("//"))
        .unwrap_or("/signin".to_owned());
    Ok(Redirect::to(&return_url))
}
