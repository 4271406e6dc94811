use std::path::{Path as FsPath, PathBuf};

use axum::{
    debug_handler,
    extract::{Multipart, Path, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{
    auth::{signup::MAX_NAME_LEN, CurrentUser},
    db::{User, UserId, UserSummary},
    redirect_back,
    session::{flash_error, push_flash, FlashLevel},
    store::Store,
    upload::ImageHost,
    AppError, AppResult, AppState, Uploads,
};

const ACCEPTED_IMAGE_TYPES: [&str; 3] = ["png", "jpg", "jpeg"];

/// An image the requester sent along, already spooled to disk.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ProfileEdit {
    pub name: String,
    pub image: Option<ImageUpload>,
}

fn require_owner(requester: &User, target_id: UserId) -> AppResult<()> {
    if requester.id != target_id {
        return Err(AppError::PermissionDenied("You can only edit your own profile.".to_owned()));
    }
    Ok(())
}

fn accepted_image(file_name: &str) -> bool {
    FsPath::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ACCEPTED_IMAGE_TYPES.contains(&ext.to_ascii_lowercase().as_str()))
}

pub async fn edit_form(store: &Store, target_id: UserId, requester: &User) -> AppResult<UserSummary> {
    require_owner(requester, target_id)?;
    let user = store
        .user_by_id(target_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {target_id} not found")))?;
    Ok(UserSummary::from(&user))
}

/// Update name and, optionally, image. Nothing is written unless every step
/// up to and including the upload succeeded.
pub async fn edit_profile(
    store: &Store,
    images: &dyn ImageHost,
    target_id: UserId,
    requester: &User,
    edit: ProfileEdit,
) -> AppResult<UserSummary> {
    require_owner(requester, target_id)?;

    let name = edit.name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::validation(format!(
            "name can not be empty or longer than {MAX_NAME_LEN} characters"
        )));
    }

    let image = match &edit.image {
        Some(upload) if !accepted_image(&upload.file_name) => {
            return Err(AppError::validation("only png, jpg or jpeg images are accepted"));
        }
        Some(upload) => Some(images.upload(&upload.path).await?),
        None => None,
    };

    let Some(user) = store.update_profile(target_id, name, image.as_deref()).await? else {
        return Err(AppError::NotFound(format!("user {target_id} not found")));
    };
    tracing::info!(user_id = target_id, new_image = image.is_some(), "profile updated");

    Ok(UserSummary::from(&user))
}

/// Read `name` and the optional `image` file out of a multipart body.
///
/// Every file written to the spool is recorded in `spooled`, including when
/// reading fails halfway, so the caller can remove them all.
async fn read_edit(uploads: &Uploads, mut multipart: Multipart, spooled: &mut Vec<PathBuf>) -> AppResult<ProfileEdit> {
    let mut name = String::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::validation(err.body_text()))?
    {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("name") => {
                name = field.text().await.map_err(|err| AppError::validation(err.body_text()))?;
            }
            Some("image") => {
                if image.is_some() {
                    return Err(AppError::validation("only one image can be uploaded"));
                }
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await.map_err(|err| AppError::validation(err.body_text()))?;
                if file_name.is_empty() || bytes.is_empty() {
                    continue;
                }

                tokio::fs::create_dir_all(&uploads.dir).await?;
                let path = uploads.dir.join(Uuid::now_v7().simple().to_string());
                spooled.push(path.clone());
                tokio::fs::write(&path, &bytes).await?;
                image = Some(ImageUpload { file_name, path });
            }
            _ => {}
        }
    }

    Ok(ProfileEdit { name, image })
}

async fn discard_spool(spooled: &[PathBuf]) {
    for path in spooled {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "could not remove spooled upload"),
        }
    }
}

async fn apply_edit(
    store: &Store,
    uploads: &Uploads,
    target_id: UserId,
    requester: &User,
    multipart: Multipart,
) -> AppResult<UserSummary> {
    require_owner(requester, target_id)?;
    let mut spooled = Vec::new();
    let result = match read_edit(uploads, multipart, &mut spooled).await {
        Ok(edit) => edit_profile(store, uploads.host.as_ref(), target_id, requester, edit).await,
        Err(err) => Err(err),
    };
    discard_spool(&spooled).await;
    result
}

#[debug_handler(state = AppState)]
pub(crate) async fn edit_page(
    Path(target_id): Path<UserId>,
    State(store): State<Store>,
    CurrentUser(requester): CurrentUser,
) -> AppResult<Json<UserSummary>> {
    Ok(Json(edit_form(&store, target_id, &requester).await?))
}

/// Browser flavour of [`edit_page`]: someone else's form sends the requester
/// back to their own.
#[debug_handler(state = AppState)]
pub(crate) async fn edit_page_back(
    Path(target_id): Path<UserId>,
    State(store): State<Store>,
    CurrentUser(requester): CurrentUser,
    session: Session,
) -> AppResult<Response> {
    match edit_form(&store, target_id, &requester).await {
        Ok(summary) => Ok(Json(summary).into_response()),
        Err(err @ AppError::PermissionDenied(_)) => {
            flash_error(&session, err).await?;
            Ok(Redirect::to(&format!("/users/{}/edit", requester.id)).into_response())
        }
        Err(err) => Err(err),
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn api_put_user(
    Path(target_id): Path<UserId>,
    State(store): State<Store>,
    State(uploads): State<Uploads>,
    CurrentUser(requester): CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<UserSummary>> {
    Ok(Json(apply_edit(&store, &uploads, target_id, &requester, multipart).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn put_user(
    Path(target_id): Path<UserId>,
    State(store): State<Store>,
    State(uploads): State<Uploads>,
    CurrentUser(requester): CurrentUser,
    session: Session,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Redirect> {
    match apply_edit(&store, &uploads, target_id, &requester, multipart).await {
        Ok(_) => {
            push_flash(&session, FlashLevel::Success, "profile updated").await?;
            Ok(Redirect::to(&format!("/users/{target_id}")))
        }
        Err(err @ AppError::PermissionDenied(_)) => {
            flash_error(&session, err).await?;
            Ok(Redirect::to(&format!("/users/{}/edit", requester.id)))
        }
        Err(err) => {
            flash_error(&session, err).await?;
            Ok(redirect_back(&headers, &format!("/users/{target_id}/edit")))
        }
    }
}
