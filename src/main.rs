use std::sync::Arc;

use anyhow::Context;
use dinebook::{
    app, auth::TokenKeys, config::Config, session_layer, store::Store, upload::ImgurHost, AppState, Uploads,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dinebook=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let store = Store::connect(&config.database_url, config.max_connections)
        .await
        .with_context(|| format!("could not open {}", config.database_url))?;

    if let Some(email) = &config.admin_email {
        match store.user_by_email(email).await? {
            Some(user) if !user.is_admin => {
                store.set_admin(user.id, true).await?;
                tracing::info!(user_id = user.id, "promoted bootstrap admin");
            }
            Some(_) => {}
            None => tracing::warn!(%email, "ADMIN_EMAIL does not match any account"),
        }
    }

    let host = ImgurHost::new(config.imgur_client_id.clone(), config.upload_timeout)?;
    if config.imgur_client_id.is_none() {
        tracing::warn!("IMGUR_CLIENT_ID is not set, profile image uploads will fail");
    }

    let state = AppState {
        store,
        tokens: TokenKeys::new(config.jwt_secret.as_bytes()),
        uploads: Uploads {
            host: Arc::new(host),
            dir: config.upload_dir.clone(),
        },
    };

    let router = app(state, session_layer(&config));
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
