use std::time::{Duration, SystemTime};

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lapangin_types::claim::TimeLimited;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};

pub const MIN_SECRET_LEN: usize = 32;

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Issues and validates HS256 signed API tokens
pub struct TokenManager {
    keys: Keys,
    default_validity: Duration,
    header: Header,
    validation: Validation,
}

impl TokenManager {
    pub fn new(secret: impl AsRef<[u8]>, default_validity: Duration) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::ShortSecret(MIN_SECRET_LEN));
        }
        let mut validation = Validation::default();
        validation.leeway = 0;
        Ok(Self {
            keys: Keys::new(secret),
            default_validity,
            header: Header::default(),
            validation,
        })
    }

    pub fn issue(&self, claims: impl serde::Serialize + TimeLimited) -> Result<String> {
        self.issue_until(claims, SystemTime::now() + self.default_validity)
    }

    fn issue_until(
        &self,
        mut claims: impl serde::Serialize + TimeLimited,
        until: SystemTime,
    ) -> Result<String> {
        claims.set_validity(until);
        let token = encode(&self.header, &claims, &self.keys.encoding)?;
        Ok(token)
    }

    #[cfg(test)]
    pub fn issue_expired(&self, claims: impl serde::Serialize + TimeLimited) -> Result<String> {
        self.issue_until(claims, SystemTime::now() - self.default_validity)
    }

    pub fn validate<T>(&self, token: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let data = decode::<T>(token, &self.keys.decoding, &self.validation).inspect_err(|e| {
            debug!("Token rejected: {e}");
        })?;
        Ok(data.claims)
    }

    pub fn default_validity(&self) -> Duration {
        self.default_validity
    }
}
