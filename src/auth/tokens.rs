use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{ChatError, ChatResult, UserId};

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    user_id: UserId,
    exp: i64,
}

/// Issues and verifies the bearer tokens handed out at signup and login.
#[derive(Clone)]
pub struct Tokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: time::Duration,
}

impl Tokens {
    pub fn new(secret: &[u8], ttl: time::Duration) -> Tokens {
        Tokens {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn issue(&self, user_id: UserId) -> anyhow::Result<String> {
        let claims = Claims {
            user_id,
            exp: (OffsetDateTime::now_utc() + self.ttl).unix_timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> ChatResult<UserId> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims.user_id)
            .map_err(|err| ChatError::AuthFailure(err.to_string()))
    }
}
