use axum::{debug_handler, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{AppError, AppResult};

pub const USER_ID: &str = "user_id";
pub const FLASH: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub message: String,
}

/// Queue a one-shot message for the next page the browser loads.
pub async fn push_flash(session: &Session, level: FlashLevel, message: impl Into<String>) -> AppResult<()> {
    let mut pending = session.get::<Vec<FlashMessage>>(FLASH).await?.unwrap_or_default();
    pending.push(FlashMessage { level, message: message.into() });
    session.insert(FLASH, pending).await?;
    Ok(())
}

/// Turn a failed operation into flash messages. Internal errors are not the
/// user's to see and are handed back to the caller instead.
pub async fn flash_error(session: &Session, err: AppError) -> AppResult<()> {
    match err {
        AppError::Validation(errors) => {
            for message in errors {
                push_flash(session, FlashLevel::Error, message).await?;
            }
            Ok(())
        }
        AppError::Internal(_) => Err(err),
        AppError::Conflict(_) => push_flash(session, FlashLevel::Warning, err.public_message()).await,
        other => push_flash(session, FlashLevel::Error, other.public_message()).await,
    }
}

pub async fn take_flash(session: &Session) -> AppResult<Vec<FlashMessage>> {
    Ok(session.remove::<Vec<FlashMessage>>(FLASH).await?.unwrap_or_default())
}

#[debug_handler]
pub(crate) async fn flash(session: Session) -> AppResult<Json<Vec<FlashMessage>>> {
    Ok(Json(take_flash(&session).await?))
}
