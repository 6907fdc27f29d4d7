use garde::Validate;
use rust_decimal::{Decimal, prelude::ToPrimitive as _};
use serde::{Deserialize, Serialize};
use sqlx::{Acquire as _, Pool, QueryBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    Caller, ChosenConnection, ChosenDB,
    error::{Error, Result},
    rating::Rating,
};

const MAX_PRICE_CENTS: i64 = 100_000_000_000;

fn price_to_cents(price: Decimal) -> Result<i64> {
    let price = price.normalize();
    if price.scale() > 2 {
        return Err(Error::invalid("Price must have at most two fractional digits"));
    }
    if price.is_sign_negative() && !price.is_zero() {
        return Err(Error::invalid("Price must not be negative"));
    }
    let mut cents = price;
    cents.rescale(2);
    i64::try_from(cents.mantissa())
        .ok()
        .filter(|c| *c <= MAX_PRICE_CENTS)
        .ok_or_else(|| Error::invalid("Price is too high"))
}

fn cents_to_price(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn is_valid_price(value: &Decimal, _ctx: &()) -> garde::Result {
    price_to_cents(*value)
        .map(|_| ())
        .map_err(|e| garde::Error::new(e.to_string()))
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateVenue {
    #[garde(length(min = 1, max = 255))]
    pub name: String,
    #[garde(length(min = 1, max = 255))]
    pub city: String,
    #[garde(length(min = 1, max = 255))]
    pub country: String,
    #[garde(length(max = 255))]
    pub home_teams: Option<String>,
    #[garde(range(min = 1))]
    pub capacity: i64,
    #[garde(custom(is_valid_price))]
    pub price: Decimal,
    #[garde(length(max = 1023))]
    pub thumbnail: Option<String>,
    #[garde(length(max = 5000))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateVenue {
    #[garde(dive)]
    #[serde(flatten)]
    pub venue: CreateVenue,
    #[garde(range(min = 1))]
    pub version: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct VenueFilter {
    /// Case insensitive match on name or city
    #[garde(length(max = 255))]
    pub q: Option<String>,
    /// Minimal capacity
    #[garde(range(min = 0))]
    pub capacity: Option<i64>,
    #[garde(skip)]
    pub max_price: Option<Decimal>,
}

#[derive(Debug, sqlx::FromRow)]
struct VenueRow {
    id: Uuid,
    name: String,
    city: String,
    country: String,
    home_teams: Option<String>,
    capacity: i64,
    price: i64,
    thumbnail: Option<String>,
    description: Option<String>,
    owner_id: Option<i64>,
    rating: i64,
    version: i64,
    created: time::PrimitiveDateTime,
    modified: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub country: String,
    pub home_teams: Option<String>,
    pub capacity: i64,
    pub price: Decimal,
    pub thumbnail: Option<String>,
    pub description: Option<String>,
    pub owner_id: Option<i64>,
    pub rating: Rating,
    pub version: i64,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

impl From<VenueRow> for Venue {
    fn from(row: VenueRow) -> Self {
        Venue {
            id: row.id,
            name: row.name,
            city: row.city,
            country: row.country,
            home_teams: row.home_teams,
            capacity: row.capacity,
            price: cents_to_price(row.price),
            thumbnail: row.thumbnail,
            description: row.description,
            owner_id: row.owner_id,
            rating: Rating::from_stored(row.rating),
            version: row.version,
            created: row.created,
            modified: row.modified,
        }
    }
}

const VENUE_FIELDS: &str = "id, name, city, country, home_teams, capacity, price, thumbnail, \
    description, owner_id, rating, version, created, modified";

/// Takes the database write lock and checks the venue exists.
///
/// Must be the first statement of a transaction which reads bookings or
/// reviews of the venue and then writes them.
pub(crate) async fn lock_venue(conn: &mut ChosenConnection, id: Uuid) -> Result<()> {
    let res = sqlx::query("UPDATE venue SET rating = rating WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if res.rows_affected() == 0 {
        Err(Error::not_found("Venue"))
    } else {
        Ok(())
    }
}

async fn get<'c, E>(id: Uuid, executor: E) -> Result<Venue>
where
    E: sqlx::Executor<'c, Database = ChosenDB>,
{
    let record = sqlx::query_as::<_, VenueRow>(&format!(
        "SELECT {VENUE_FIELDS} FROM venue WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| Error::not_found("Venue"))?;
    Ok(record.into())
}

pub type VenueRepository = VenueRepositoryImpl<Pool<ChosenDB>>;

pub struct VenueRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> VenueRepositoryImpl<E>
where
    for<'a> &'a E:
        sqlx::Executor<'c, Database = ChosenDB> + sqlx::Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateVenue, owner_id: Option<i64>) -> Result<Venue> {
        let price = price_to_cents(payload.price)?;
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO venue (id, name, city, country, home_teams, capacity, price, thumbnail, description, owner_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&payload.name)
        .bind(&payload.city)
        .bind(&payload.country)
        .bind(&payload.home_teams)
        .bind(payload.capacity)
        .bind(price)
        .bind(&payload.thumbnail)
        .bind(&payload.description)
        .bind(owner_id)
        .execute(&self.executor)
        .await?;
        info!("Created venue {id} ({})", payload.name);
        self.get(id).await
    }

    /// Updates descriptive fields, rating stays untouched
    pub async fn update(&self, caller: Caller, id: Uuid, payload: UpdateVenue) -> Result<Venue> {
        let version = payload.version.ok_or_else(|| {
            debug!("No version provided");
            Error::MissingVersion
        })?;
        let price = price_to_cents(payload.venue.price)?;
        let mut tx = self.executor.begin().await?;
        lock_venue(&mut *tx, id).await?;
        let current = get(id, &mut *tx).await?;
        if !caller.can_manage(current.owner_id) {
            return Err(Error::forbidden("Only owner or admin can change the venue"));
        }

        let venue = payload.venue;
        let result = sqlx::query(
            "UPDATE venue SET name = ?, city = ?, country = ?, home_teams = ?, capacity = ?, price = ?,
            thumbnail = ?, description = ?, version = ?, modified = CURRENT_TIMESTAMP
            WHERE id = ? AND version = ?",
        )
        .bind(&venue.name)
        .bind(&venue.city)
        .bind(&venue.country)
        .bind(&venue.home_teams)
        .bind(venue.capacity)
        .bind(price)
        .bind(&venue.thumbnail)
        .bind(&venue.description)
        .bind(version + 1)
        .bind(id)
        .bind(version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            Err(Error::FailedUpdate {
                id: id.to_string(),
                version,
            })
        } else {
            let record = get(id, &mut *tx).await?;
            tx.commit().await?;
            Ok(record)
        }
    }

    /// Deletes venue together with its bookings and reviews
    pub async fn delete(&self, caller: Caller, id: Uuid) -> Result<()> {
        let mut tx = self.executor.begin().await?;
        lock_venue(&mut *tx, id).await?;
        let owner_id: Option<i64> = sqlx::query_scalar("SELECT owner_id FROM venue WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if !caller.can_manage(owner_id) {
            return Err(Error::forbidden("Only owner or admin can delete the venue"));
        }
        sqlx::query("DELETE FROM venue WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!("Deleted venue {id}");
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Venue> {
        get(id, &self.executor).await
    }

    pub async fn search(&self, filter: VenueFilter, limit: usize) -> Result<Vec<Venue>> {
        let mut query =
            QueryBuilder::<ChosenDB>::new(format!("SELECT {VENUE_FIELDS} FROM venue WHERE 1 = 1"));
        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", q.to_lowercase());
            query
                .push(" AND (lower(name) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR lower(city) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(capacity) = filter.capacity {
            query.push(" AND capacity >= ").push_bind(capacity);
        }
        if let Some(max_price) = filter.max_price {
            // bounds beyond any storable price match everything
            let max_cents = max_price
                .checked_mul(Decimal::ONE_HUNDRED)
                .and_then(|cents| cents.floor().to_i64())
                .unwrap_or(if max_price.is_sign_negative() { i64::MIN } else { i64::MAX });
            query.push(" AND price <= ").push_bind(max_cents);
        }
        query
            .push(" ORDER BY name, id LIMIT ")
            .push_bind(limit.min(crate::MAX_LIMIT) as i64);

        let venues = query
            .build_query_as::<VenueRow>()
            .fetch_all(&self.executor)
            .await?
            .into_iter()
            .map(Venue::from)
            .collect();
        Ok(venues)
    }
}
