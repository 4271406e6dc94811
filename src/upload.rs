//! Client for the external image host used for profile pictures.

use std::{future::Future, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;

use crate::{AppError, AppResult};

const IMGUR_UPLOAD_URL: &str = "https://api.imgur.com/3/image";

#[async_trait]
pub trait ImageHost: Send + Sync {
    /// Upload the file at `path` and return its public URL.
    async fn upload(&self, path: &Path) -> AppResult<String>;
}

pub type ImageHostRef = Arc<dyn ImageHost>;

#[derive(Debug, Deserialize)]
struct ImgurResponse {
    data: ImgurImage,
}

#[derive(Debug, Deserialize)]
struct ImgurImage {
    link: String,
}

pub struct ImgurHost {
    http_client: reqwest::Client,
    client_id: Option<String>,
    timeout: Duration,
    attempts: u32,
}

impl ImgurHost {
    pub fn new(client_id: Option<String>, timeout: Duration) -> AppResult<Self> {
        let http_client = reqwest::ClientBuilder::new()
            .timeout(timeout)
            .build()?;
        Ok(ImgurHost {
            http_client,
            client_id,
            timeout,
            attempts: 3,
        })
    }

    async fn upload_once(&self, client_id: &str, bytes: Vec<u8>) -> AppResult<String> {
        let form = reqwest::multipart::Form::new()
            .part("image", reqwest::multipart::Part::bytes(bytes));
        let body: ImgurResponse = self.http_client
            .post(IMGUR_UPLOAD_URL)
            .header("Authorization", format!("Client-ID {client_id}"))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body.data.link)
    }
}

#[async_trait]
impl ImageHost for ImgurHost {
    async fn upload(&self, path: &Path) -> AppResult<String> {
        let Some(client_id) = self.client_id.as_deref() else {
            return Err(AppError::Upstream("image uploads are not configured".to_owned()));
        };
        let bytes = tokio::fs::read(path).await?;

        with_retries(self.attempts, self.timeout, || self.upload_once(client_id, bytes.clone()))
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "image upload failed");
                AppError::Upstream("image upload failed, please try again later".to_owned())
            })
    }
}

/// Run `attempt` up to `attempts` times, each bounded by `timeout`, with
/// jittered exponential backoff in between.
pub async fn with_retries<T, F, Fut>(attempts: u32, timeout: Duration, mut attempt: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let attempts = attempts.max(1);
    let mut n = 0;
    loop {
        if n > 0 {
            let jitter: u64 = rand::rng().random_range(0..100);
            tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(n - 1) + jitter)).await;
        }

        let err = match tokio::time::timeout(timeout, attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_) => AppError::Upstream(format!("attempt timed out after {timeout:?}")),
        };
        n += 1;
        tracing::debug!(attempt = n, error = %err, "upload attempt failed");
        if n == attempts {
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = &AtomicU32::new(0);
        let url = with_retries(3, Duration::from_secs(1), move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::Upstream("flaky".into()))
            } else {
                Ok("https://i.imgur.com/ok.png".to_owned())
            }
        })
        .await
        .unwrap();
        assert_eq!(url, "https://i.imgur.com/ok.png");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempts_time_out() {
        let calls = &AtomicU32::new(0);
        let result: AppResult<String> = with_retries(2, Duration::from_millis(50), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        })
        .await;
        assert!(matches!(result, Err(AppError::Upstream(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unconfigured_host_is_an_upstream_error() {
        let host = ImgurHost::new(None, Duration::from_secs(1)).unwrap();
        let err = host.upload(Path::new("missing.png")).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}
