use std::{collections::HashSet, fmt::Display, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    VenueProvider,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::VenueProvider => "venue_provider",
            Role::User => "user",
        }
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Role::Admin),
            "venue_provider" => Ok(Role::VenueProvider),
            "user" => Ok(Role::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

pub trait TimeLimited {
    fn set_validity(&mut self, until: SystemTime);
    fn check_validity(&self) -> bool;
}

pub trait Authorization {
    fn has_role(&self, role: Role) -> bool;

    fn has_any_role<I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = Role>,
    {
        roles.into_iter().any(|role| self.has_role(role))
    }

    fn has_all_roles<I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = Role>,
    {
        roles.into_iter().all(|role| self.has_role(role))
    }

    /// The one capability check for administrative rights, shared by all
    /// ownership-guarded operations.
    fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiClaim {
    pub sub: String,
    pub exp: u64,
    pub roles: HashSet<Role>,
}

impl ApiClaim {
    /// Claim with validity not yet set, token manager sets it on issue
    pub fn new_expired(sub: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            sub: sub.into(),
            exp: 0,
            roles: roles.into_iter().collect(),
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

impl Authorization for ApiClaim {
    fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl TimeLimited for ApiClaim {
    fn set_validity(&mut self, until: SystemTime) {
        self.exp = until
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
    }

    fn check_validity(&self) -> bool {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(u64::MAX);
        self.exp > now
    }
}
