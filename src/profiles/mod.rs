mod edit;
mod page;
mod top;

use axum::{routing::get, Router};

pub use edit::{edit_form, edit_profile, ImageUpload, ProfileEdit};
pub use page::{dedup_restaurants, get_profile, ProfileView};
pub use top::{get_top_users, rank, TopUser};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/top", get(top::top_users))
        .route("/{id}", get(page::profile).put(edit::put_user))
        .route("/{id}/edit", get(edit::edit_page_back))
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/top", get(top::top_users))
        .route("/{id}", get(page::profile).put(edit::api_put_user))
        .route("/{id}/edit", get(edit::edit_page))
}
