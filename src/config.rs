use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};

/// Runtime settings, read from `.env` and then the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub imgur_client_id: Option<String>,
    pub upload_dir: PathBuf,
    pub upload_timeout: Duration,
    pub session_inactivity: time::Duration,
    pub session_secure: bool,
    /// Promoted to admin at startup, if such an account exists.
    pub admin_email: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        // a missing .env is fine, the variables may come from the environment
        let _ = dotenv::dotenv();
        Config::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|secret| !secret.is_empty())
            .ok_or(anyhow!("JWT_SECRET must be set"))?;

        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or("sqlite://dinebook.db?mode=rwc".to_owned()),
            max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 16)?,
            bind_addr: parsed(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            jwt_secret,
            imgur_client_id: lookup("IMGUR_CLIENT_ID").filter(|id| !id.is_empty()),
            upload_dir: lookup("UPLOAD_DIR").map(PathBuf::from).unwrap_or(PathBuf::from("temp")),
            upload_timeout: Duration::from_secs(parsed(&lookup, "UPLOAD_TIMEOUT_SECS", 10)?),
            session_inactivity: time::Duration::minutes(parsed(&lookup, "SESSION_INACTIVITY_MINUTES", 60)?),
            session_secure: parsed(&lookup, "SESSION_SECURE", false)?,
            admin_email: lookup("ADMIN_EMAIL").map(|email| email.trim().to_owned()).filter(|email| !email.is_empty()),
        })
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_everything_but_the_secret() {
        let config = Config::from_lookup(lookup_from(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.upload_timeout, Duration::from_secs(10));
        assert_eq!(config.session_inactivity, time::Duration::minutes(60));
        assert!(config.imgur_client_id.is_none());
        assert!(!config.session_secure);
        assert!(config.admin_email.is_none());
    }

    #[test]
    fn secret_is_required() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn bad_numbers_name_the_variable() {
        let err = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("UPLOAD_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("UPLOAD_TIMEOUT_SECS"));
    }
}
