pub mod admin;
pub mod appresult;
pub mod auth;
pub mod comments;
pub mod config;
pub mod db;
pub mod index;
pub mod profiles;
pub mod session;
pub mod social;
pub mod store;
pub mod upload;

use std::path::PathBuf;

use axum::{
    extract::FromRef,
    http::{header::REFERER, HeaderMap},
    response::Redirect,
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tower_sessions::{cookie::SameSite, Expiry, MemoryStore, SessionManagerLayer};

pub use appresult::{AppError, AppResult};

use crate::{auth::TokenKeys, config::Config, store::Store, upload::ImageHostRef};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Store,
    pub tokens: TokenKeys,
    pub uploads: Uploads,
}

/// Where profile images go: the host they are pushed to and the local spool
/// directory they wait in until then.
#[derive(Clone)]
pub struct Uploads {
    pub host: ImageHostRef,
    pub dir: PathBuf,
}

/// Redirect to the page the request came from, or `fallback` when there is no
/// usable `Referer`. Only the path and query are kept so a crafted header can
/// not bounce the browser to another site.
pub fn redirect_back(headers: &HeaderMap, fallback: &str) -> Redirect {
    let target = headers
        .get(REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(|referer| reqwest::Url::parse(referer).ok())
        .map(|url| match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_owned(),
        });

    match target {
        Some(path) => Redirect::to(&path),
        None => Redirect::to(fallback),
    }
}

pub fn session_layer(config: &Config) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.session_secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(config.session_inactivity))
}

pub fn app(state: AppState, session_layer: SessionManagerLayer<MemoryStore>) -> Router {
    let api = Router::new()
        .merge(auth::api_router())
        .merge(social::api_router())
        .nest("/users", profiles::api_router())
        .nest("/comments", comments::router())
        .nest("/admin", admin::api_router());

    Router::new()
        .route("/", get(index::index))
        .route("/flash", get(session::flash))
        .merge(auth::router())
        .merge(social::router())
        .nest("/users", profiles::router())
        .nest("/comments", comments::router())
        .nest("/api", api)
        .with_state(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
