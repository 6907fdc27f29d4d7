use time::Date;

pub type Result<T, E = Error> = std::result::Result<T, E>;

const OVERLAP_MARKER: &str = "booking_overlap";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("User password error: {0}")]
    UserPasswordError(#[from] argon2::password_hash::Error),

    #[error("Record not found: {0}")]
    RecordNotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Venue is already booked for some day between {from} and {to}")]
    DateConflict { from: Date, to: Date },

    #[error("Booking has already started and cannot be changed")]
    PastBooking,

    #[error("Missing version")]
    MissingVersion,

    #[error("Failed to update record {id} version {version}")]
    FailedUpdate { id: String, version: i64 },
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::RecordNotFound(what.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Error::Forbidden(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

/// Maps a failed booking write, the overlap trigger is the last line
/// against concurrent double booking.
pub fn booking_write_error(e: sqlx::Error, from: Date, to: Date) -> Error {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.message().contains(OVERLAP_MARKER) {
            return Error::DateConflict { from, to };
        }
        if db_err.is_foreign_key_violation() {
            return Error::not_found("Venue or user");
        }
        if db_err.is_check_violation() {
            return Error::invalid("Start date must not be after end date");
        }
    }
    Error::DatabaseError(e)
}
