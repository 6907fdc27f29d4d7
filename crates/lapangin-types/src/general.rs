use std::str::FromStr;

use garde::Validate;
use serde::{Deserialize, Serialize};

/// Account e-mail, compared case-insensitively, so it is kept lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Validate, Hash, PartialOrd, Ord, Serialize)]
#[garde(transparent)]
pub struct ValidEmail(#[garde(email)] String);

#[cfg(feature = "e2e-tests")]
impl ValidEmail {
    pub fn cheat(email: String) -> Self {
        ValidEmail(email)
    }
}

impl<'de> Deserialize<'de> for ValidEmail {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // validity is checked by garde on the enclosing payload
        let raw = String::deserialize(deserializer)?;
        Ok(ValidEmail(normalize(&raw)))
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl FromStr for ValidEmail {
    type Err = garde::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let email = ValidEmail(normalize(s));
        email.validate()?;
        Ok(email)
    }
}

impl AsRef<str> for ValidEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
