//! Venue rating aggregation
//!
//! Ratings are kept as whole tenths (0..=50) both in storage and in
//! [`Rating`], so the aggregate never drifts. The displayed venue rating is
//! the arithmetic mean of its reviews, rounded half-up to one fractional
//! digit, and it is recomputed inside the same transaction as every review
//! write.

use std::fmt::Display;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    ChosenConnection,
    error::{Error, Result},
};

const MAX_TENTHS: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Rating(u8);

impl Rating {
    pub const ZERO: Rating = Rating(0);
    pub const MAX: Rating = Rating(MAX_TENTHS);

    pub fn from_tenths(tenths: i64) -> Result<Self> {
        u8::try_from(tenths)
            .ok()
            .filter(|t| *t <= MAX_TENTHS)
            .map(Rating)
            .ok_or_else(|| Error::invalid("Rating must be between 0.0 and 5.0"))
    }

    /// For values read back from storage, where the schema already enforces the range
    pub(crate) fn from_stored(tenths: i64) -> Self {
        Rating(tenths.clamp(0, MAX_TENTHS as i64) as u8)
    }

    pub fn tenths(self) -> i64 {
        self.0 as i64
    }

    pub fn as_decimal(self) -> Decimal {
        Decimal::new(self.0 as i64, 1)
    }

    /// Arithmetic mean rounded half-up to one fractional digit, zero for no ratings
    pub fn mean<I>(ratings: I) -> Rating
    where
        I: IntoIterator<Item = Rating>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0i64), |(sum, count), r| (sum + r.tenths(), count + 1));
        if count == 0 {
            return Rating::ZERO;
        }
        let mean = Decimal::from(sum) / Decimal::from(count * 10);
        let mut rounded = mean.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(1);
        Rating::from_stored(rounded.mantissa() as i64)
    }
}

impl TryFrom<Decimal> for Rating {
    type Error = Error;

    fn try_from(value: Decimal) -> Result<Self> {
        let value = value.normalize();
        if value.scale() > 1 {
            return Err(Error::invalid(
                "Rating must have at most one fractional digit",
            ));
        }
        if value.is_sign_negative() && !value.is_zero() {
            return Err(Error::invalid("Rating must be between 0.0 and 5.0"));
        }
        let mut tenths = value;
        tenths.rescale(1);
        let mantissa = tenths.mantissa();
        if mantissa > MAX_TENTHS as i128 {
            return Err(Error::invalid("Rating must be between 0.0 and 5.0"));
        }
        Rating::from_tenths(mantissa as i64)
    }
}

impl From<Rating> for Decimal {
    fn from(value: Rating) -> Self {
        value.as_decimal()
    }
}

impl Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_decimal())
    }
}

/// Recomputes and stores venue rating from all its current reviews.
///
/// Must run on the connection of the transaction that changed the reviews.
pub(crate) async fn recompute_venue_rating(
    conn: &mut ChosenConnection,
    venue_id: Uuid,
) -> Result<Rating> {
    let ratings: Vec<i64> = sqlx::query_scalar("SELECT rating FROM review WHERE venue_id = ?")
        .bind(venue_id)
        .fetch_all(&mut *conn)
        .await?;
    let count = ratings.len();
    let rating = Rating::mean(ratings.into_iter().map(Rating::from_stored));

    sqlx::query("UPDATE venue SET rating = ? WHERE id = ?")
        .bind(rating.tenths())
        .bind(venue_id)
        .execute(&mut *conn)
        .await?;
    debug!("Venue {venue_id} rating recomputed from {count} reviews: {rating}");
    Ok(rating)
}
