//! Booking ledger
//!
//! Bookings are closed date intervals `[start_date, end_date]`. For a single
//! venue no two bookings may share a day, so `[1,5]` and `[6,10]` can coexist
//! while `[1,5]` and `[5,10]` cannot. A single day booking is `start_date ==
//! end_date`.
//!
//! Every write runs in one transaction which starts by taking the venue lock
//! (see [`crate::venue`]), then checks for overlap and writes. The overlap
//! triggers in the schema reject anything that would slip through.

use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire as _, Pool};
use time::Date;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    Caller, ChosenConnection, ChosenDB,
    error::{Error, Result, booking_write_error},
    venue::lock_venue,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBooking {
    #[garde(skip)]
    pub venue_id: Uuid,
    #[garde(skip)]
    pub start_date: Date,
    #[garde(skip)]
    pub end_date: Date,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChangeBooking {
    #[garde(skip)]
    pub start_date: Date,
    #[garde(skip)]
    pub end_date: Date,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: i64,
    pub venue_id: Uuid,
    pub user_id: i64,
    pub start_date: Date,
    pub end_date: Date,
    pub created: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookedRange {
    pub from: Date,
    pub to: Date,
}

impl BookedRange {
    pub fn overlaps(&self, other: &BookedRange) -> bool {
        self.from <= other.to && other.from <= self.to
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserBookingRow {
    id: i64,
    venue_id: Uuid,
    venue_name: String,
    start_date: Date,
    end_date: Date,
    created: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBooking {
    pub id: i64,
    pub venue_id: Uuid,
    pub venue_name: String,
    pub start_date: Date,
    pub end_date: Date,
    pub created: time::PrimitiveDateTime,
    pub can_modify: bool,
}

const BOOKING_FIELDS: &str = "id, venue_id, user_id, start_date, end_date, created";

fn check_range(start_date: Date, end_date: Date, today: Date) -> Result<()> {
    if start_date > end_date {
        return Err(Error::invalid("Start date must not be after end date"));
    }
    if start_date < today {
        return Err(Error::invalid("Booking cannot start in the past"));
    }
    Ok(())
}

async fn find_conflict(
    conn: &mut ChosenConnection,
    venue_id: Uuid,
    start_date: Date,
    end_date: Date,
    exclude: Option<i64>,
) -> Result<Option<BookedRange>> {
    let conflict = sqlx::query_as::<_, BookedRange>(
        "SELECT start_date AS \"from\", end_date AS \"to\" FROM booking
        WHERE venue_id = ? AND start_date <= ? AND end_date >= ? AND id IS NOT ?
        ORDER BY start_date LIMIT 1",
    )
    .bind(venue_id)
    .bind(end_date)
    .bind(start_date)
    .bind(exclude)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(conflict)
}

/// Locks the venue of the booking, so it works as the existence check too
async fn lock_booking(conn: &mut ChosenConnection, id: i64) -> Result<Booking> {
    let res = sqlx::query(
        "UPDATE venue SET rating = rating WHERE id = (SELECT venue_id FROM booking WHERE id = ?)",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(Error::not_found("Booking"));
    }
    get(id, &mut *conn).await
}

/// Ownership is checked before time, an elapsed booking of somebody else is
/// still reported as forbidden
fn check_editable(caller: &Caller, booking: &Booking, today: Date) -> Result<()> {
    if !caller.can_manage(Some(booking.user_id)) {
        return Err(Error::forbidden("Booking belongs to other user"));
    }
    if booking.start_date < today {
        return Err(Error::PastBooking);
    }
    Ok(())
}

async fn get<'c, E>(id: i64, executor: E) -> Result<Booking>
where
    E: sqlx::Executor<'c, Database = ChosenDB>,
{
    sqlx::query_as::<_, Booking>(&format!("SELECT {BOOKING_FIELDS} FROM booking WHERE id = ?"))
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| Error::not_found("Booking"))
}

pub type BookingRepository = BookingRepositoryImpl<Pool<ChosenDB>>;

pub struct BookingRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> BookingRepositoryImpl<E>
where
    for<'a> &'a E:
        sqlx::Executor<'c, Database = ChosenDB> + sqlx::Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Ranges still relevant for availability, that is ending on `as_of` or later
    pub async fn booked_ranges(&self, venue_id: Uuid, as_of: Date) -> Result<Vec<BookedRange>> {
        let mut conn = self.executor.acquire().await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM venue WHERE id = ?")
            .bind(venue_id)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Err(Error::not_found("Venue"));
        }
        let ranges = sqlx::query_as::<_, BookedRange>(
            "SELECT start_date AS \"from\", end_date AS \"to\" FROM booking
            WHERE venue_id = ? AND end_date >= ? ORDER BY start_date",
        )
        .bind(venue_id)
        .bind(as_of)
        .fetch_all(&mut *conn)
        .await?;
        Ok(ranges)
    }

    pub async fn create(&self, user_id: i64, payload: CreateBooking, today: Date) -> Result<Booking> {
        let CreateBooking {
            venue_id,
            start_date,
            end_date,
        } = payload;
        check_range(start_date, end_date, today)?;

        let mut tx = self.executor.begin().await?;
        lock_venue(&mut *tx, venue_id).await?;
        if let Some(conflict) = find_conflict(&mut *tx, venue_id, start_date, end_date, None).await? {
            debug!("Booking {start_date}..{end_date} of venue {venue_id} conflicts with {conflict:?}");
            return Err(Error::DateConflict {
                from: conflict.from,
                to: conflict.to,
            });
        }
        let result = sqlx::query(
            "INSERT INTO booking (venue_id, user_id, start_date, end_date) VALUES (?, ?, ?, ?)",
        )
        .bind(venue_id)
        .bind(user_id)
        .bind(start_date)
        .bind(end_date)
        .execute(&mut *tx)
        .await
        .map_err(|e| booking_write_error(e, start_date, end_date))?;

        let id = result.last_insert_rowid();
        let booking = get(id, &mut *tx).await?;
        tx.commit().await?;
        info!("User {user_id} booked venue {venue_id} for {start_date}..{end_date} as {id}");
        Ok(booking)
    }

    /// Moves booking to new dates, identity and creation time are kept
    pub async fn modify(
        &self,
        caller: Caller,
        id: i64,
        change: ChangeBooking,
        today: Date,
    ) -> Result<Booking> {
        let ChangeBooking {
            start_date,
            end_date,
        } = change;
        let mut tx = self.executor.begin().await?;
        let booking = lock_booking(&mut *tx, id).await?;
        check_editable(&caller, &booking, today)?;
        check_range(start_date, end_date, today)?;

        if let Some(conflict) =
            find_conflict(&mut *tx, booking.venue_id, start_date, end_date, Some(id)).await?
        {
            debug!("Change of booking {id} to {start_date}..{end_date} conflicts with {conflict:?}");
            return Err(Error::DateConflict {
                from: conflict.from,
                to: conflict.to,
            });
        }
        sqlx::query("UPDATE booking SET start_date = ?, end_date = ? WHERE id = ?")
            .bind(start_date)
            .bind(end_date)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| booking_write_error(e, start_date, end_date))?;

        let booking = get(id, &mut *tx).await?;
        tx.commit().await?;
        info!("Booking {id} moved to {start_date}..{end_date}");
        Ok(booking)
    }

    pub async fn cancel(&self, caller: Caller, id: i64, today: Date) -> Result<()> {
        let mut tx = self.executor.begin().await?;
        let booking = lock_booking(&mut *tx, id).await?;
        check_editable(&caller, &booking, today)?;
        sqlx::query("DELETE FROM booking WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!("Booking {id} cancelled by user {}", caller.user_id);
        Ok(())
    }

    /// All bookings of the user, latest start first
    pub async fn list_for_user(&self, user_id: i64, today: Date) -> Result<Vec<UserBooking>> {
        let rows = sqlx::query_as::<_, UserBookingRow>(
            "SELECT b.id, b.venue_id, v.name AS venue_name, b.start_date, b.end_date, b.created
            FROM booking b JOIN venue v ON b.venue_id = v.id
            WHERE b.user_id = ?
            ORDER BY b.start_date DESC, b.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.executor)
        .await?;

        let bookings = rows
            .into_iter()
            .map(|row| UserBooking {
                can_modify: row.start_date >= today,
                id: row.id,
                venue_id: row.venue_id,
                venue_name: row.venue_name,
                start_date: row.start_date,
                end_date: row.end_date,
                created: row.created,
            })
            .collect();
        Ok(bookings)
    }

    pub async fn get(&self, id: i64) -> Result<Booking> {
        get(id, &self.executor).await
    }
}
