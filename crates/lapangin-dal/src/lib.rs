pub mod booking;
pub mod error;
pub mod faq;
pub mod rating;
pub mod review;
pub mod user;
pub mod venue;

use std::{str::FromStr as _, sync::OnceLock};

pub use error::Error;
pub use sqlx::Error as SqlxError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use time::{Date, OffsetDateTime, UtcOffset};

use crate::error::Result;

pub type ChosenDB = sqlx::Sqlite;
pub type ChosenConnection = sqlx::SqliteConnection;
pub type Pool = sqlx::Pool<ChosenDB>;

pub const MAX_LIMIT: usize = 10_000;

pub async fn new_pool(database_url: &str) -> Result<Pool, Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(50)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &Pool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

static SERVER_OFFSET: OnceLock<UtcOffset> = OnceLock::new();

/// Fixes the offset of the server's calendar, only the first call has effect.
/// The host's local offset is readable only while the process is single
/// threaded, so binaries should call this before starting the runtime.
pub fn set_server_offset(offset: UtcOffset) -> bool {
    SERVER_OFFSET.set(offset).is_ok()
}

pub fn server_offset() -> UtcOffset {
    SERVER_OFFSET
        .get()
        .copied()
        .or_else(|| UtcOffset::current_local_offset().ok())
        .unwrap_or(UtcOffset::UTC)
}

/// Calendar date of `now` as seen at `offset`
pub fn date_at(now: OffsetDateTime, offset: UtcOffset) -> Date {
    now.to_offset(offset).date()
}

/// Current calendar date of the server, the reference for all
/// "in the past" decisions
pub fn today() -> Date {
    date_at(OffsetDateTime::now_utc(), server_offset())
}

/// Identity on whose behalf an ownership-guarded operation runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub admin: bool,
}

impl Caller {
    pub fn new(user_id: i64, admin: bool) -> Self {
        Self { user_id, admin }
    }

    pub fn user(user_id: i64) -> Self {
        Self::new(user_id, false)
    }

    pub fn can_manage(&self, owner_id: Option<i64>) -> bool {
        self.admin || owner_id == Some(self.user_id)
    }
}
