use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{Result as HashResult, SaltString, rand_core::OsRng},
};

use garde::Validate;
use lapangin_types::{
    claim::{Authorization, Role},
    general::ValidEmail,
};
use serde::{Deserialize, Serialize};
use sqlx::{Acquire as _, Pool, QueryBuilder};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{ChosenDB, Error, error::Result, rating::recompute_venue_rating};

fn hash_password(password: &str) -> HashResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string();
    Ok(password_hash)
}

fn verify_password(password: &str, password_hash: &str) -> HashResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)?;
    let res = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    if let Err(e) = res {
        debug!("Invalid password, error {e}");
    }
    Ok(res.is_ok())
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Self registration, always creates a plain active user
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct RegisterUser {
    #[garde(dive)]
    pub email: ValidEmail,
    #[garde(length(min = 3, max = 255))]
    pub name: String,
    #[garde(length(min = 8, max = 255))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateUser {
    #[garde(dive)]
    pub email: ValidEmail,
    #[garde(length(min = 3, max = 255))]
    pub name: String,
    #[garde(length(min = 8, max = 255))]
    pub password: Option<String>,
    #[garde(skip)]
    pub roles: Option<Vec<Role>>,
    #[garde(skip)]
    pub active: Option<bool>,
}

impl From<RegisterUser> for CreateUser {
    fn from(value: RegisterUser) -> Self {
        CreateUser {
            email: value.email,
            name: value.name,
            password: Some(value.password),
            roles: Some(vec![Role::User]),
            active: Some(true),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct UpdateUser {
    #[garde(dive)]
    pub email: ValidEmail,
    #[garde(length(min = 3, max = 255))]
    pub name: String,
    /// Only changed when present
    #[garde(length(min = 8, max = 255))]
    pub password: Option<String>,
    #[garde(skip)]
    pub roles: Vec<Role>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserFilter {
    #[garde(length(max = 255))]
    pub search: Option<String>,
    #[garde(skip)]
    pub status: Option<UserStatus>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserInt {
    id: i64,
    name: String,
    email: String,
    roles: Option<String>,
    active: bool,
    created: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub roles: Vec<Role>,
    pub active: bool,
    pub created: time::PrimitiveDateTime,
}

impl Authorization for User {
    fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl From<UserInt> for User {
    fn from(value: UserInt) -> Self {
        let roles = value
            .roles
            .iter()
            .flat_map(|s| s.split(','))
            .filter(|s| !s.is_empty())
            .filter_map(|s| {
                s.parse::<Role>()
                    .inspect_err(|e| warn!("User {} has invalid role stored: {e}", value.id))
                    .ok()
            })
            .collect();
        Self {
            id: value.id,
            name: value.name,
            email: value.email,
            roles,
            active: value.active,
            created: value.created,
        }
    }
}

const USER_FIELDS: &str = "id, name, email, roles, active, created";

pub type UserRepository = UserRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct UserRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> UserRepositoryImpl<E>
where
    for<'a> &'a E:
        sqlx::Executor<'c, Database = ChosenDB> + sqlx::Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateUser) -> Result<User> {
        let password = payload
            .password
            .as_deref()
            .map(hash_password)
            .transpose()?;
        let roles = join_roles(payload.roles.as_deref().unwrap_or(&[Role::User]));
        let result = sqlx::query(
            "INSERT INTO users (name, email, password, roles, active) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&payload.name)
        .bind(payload.email.as_ref())
        .bind(password)
        .bind(roles)
        .bind(payload.active.unwrap_or(true))
        .execute(&self.executor)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::invalid("E-mail is already registered")
            }
            _ => Error::from(e),
        })?;

        let id = result.last_insert_rowid();
        info!("Created user {id}");
        self.get(id).await
    }

    pub async fn update(&self, id: i64, payload: UpdateUser) -> Result<User> {
        let password = payload
            .password
            .as_deref()
            .map(hash_password)
            .transpose()?;
        let result = sqlx::query(
            "UPDATE users SET name = ?, email = ?, roles = ?, password = coalesce(?, password) WHERE id = ?",
        )
        .bind(&payload.name)
        .bind(payload.email.as_ref())
        .bind(join_roles(&payload.roles))
        .bind(password)
        .bind(id)
        .execute(&self.executor)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::invalid("E-mail is already used by other user")
            }
            _ => Error::from(e),
        })?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("User"));
        }
        self.get(id).await
    }

    /// Flips active flag, inactive users cannot log in
    pub async fn toggle_active(&self, id: i64) -> Result<User> {
        let result = sqlx::query("UPDATE users SET active = NOT active WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("User"));
        }
        self.get(id).await
    }

    pub async fn list(&self, filter: UserFilter, limit: usize) -> Result<Vec<User>> {
        let mut query = QueryBuilder::<ChosenDB>::new(format!(
            "SELECT {USER_FIELDS} FROM users WHERE 1 = 1"
        ));
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search.to_lowercase());
            query
                .push(" AND (lower(name) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR lower(email) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        match filter.status {
            Some(UserStatus::Active) => {
                query.push(" AND active = 1");
            }
            Some(UserStatus::Inactive) => {
                query.push(" AND active = 0");
            }
            None => {}
        }
        query
            .push(" ORDER BY created DESC, id DESC LIMIT ")
            .push_bind(limit.min(crate::MAX_LIMIT) as i64);

        let users = query
            .build_query_as::<UserInt>()
            .fetch_all(&self.executor)
            .await?
            .into_iter()
            .map(User::from)
            .collect();
        Ok(users)
    }

    /// Removes user with all their bookings and reviews, ratings of reviewed
    /// venues are recomputed in the same transaction
    pub async fn delete(&self, id: i64) -> Result<()> {
        let mut tx = self.executor.begin().await?;

        // write first, so the transaction holds the write lock from the start
        let res = sqlx::query("UPDATE users SET active = active WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Err(Error::not_found("User"));
        }

        let reviewed: Vec<Uuid> =
            sqlx::query_scalar("SELECT venue_id FROM review WHERE user_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for venue_id in reviewed {
            recompute_venue_rating(&mut *tx, venue_id).await?;
        }
        tx.commit().await?;
        info!("Deleted user {id}");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        let user = sqlx::query_as::<_, UserInt>(&format!(
            "SELECT {USER_FIELDS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::not_found("User"))?;
        Ok(user.into())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<User> {
        let user = sqlx::query_as::<_, UserInt>(&format!(
            "SELECT {USER_FIELDS} FROM users WHERE email = ?"
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::not_found("User"))?;
        Ok(user.into())
    }

    pub async fn check_password(&self, email: &str, password: &str) -> Result<User> {
        let (id, hashed_password, active): (i64, Option<String>, bool) =
            sqlx::query_as("SELECT id, password, active FROM users WHERE email = ?")
                .bind(email.trim().to_lowercase())
                .fetch_one(&self.executor)
                .await
                .map_err(|e| {
                    debug!("User check error: {e}");
                    Error::InvalidCredentials
                })?;
        if !active {
            debug!("User {id} is deactivated");
            return Err(Error::InvalidCredentials);
        }
        if let Some(hashed_password) = hashed_password {
            if verify_password(password, &hashed_password).unwrap_or(false) {
                return self.get(id).await;
            }
        }
        Err(Error::InvalidCredentials)
    }
}
