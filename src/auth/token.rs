use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{db::UserId, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub iat: i64,
    pub jti: Uuid,
}

/// HS256 keys for bearer tokens handed out by the API sign-in.
///
/// Tokens carry no expiry; they stay valid until the secret rotates.
#[derive(Clone)]
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenKeys {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;

        TokenKeys {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn issue(&self, user_id: UserId) -> AppResult<String> {
        let claims = Claims {
            sub: user_id,
            iat: time::OffsetDateTime::now_utc().unix_timestamp(),
            jti: Uuid::now_v7(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// The user id inside a valid token, `None` for anything forged or malformed.
    pub fn verify(&self, token: &str) -> Option<UserId> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims.sub),
            Err(err) => {
                tracing::debug!(error = %err, "rejected bearer token");
                None
            }
        }
    }
}
