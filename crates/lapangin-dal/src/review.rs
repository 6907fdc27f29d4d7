use garde::Validate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire as _, Pool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    Caller, ChosenConnection, ChosenDB,
    error::{Error, Result},
    rating::{Rating, recompute_venue_rating},
    venue::lock_venue,
};

/// At most one review per user and venue, second submission replaces the first
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpsertReview {
    #[garde(skip)]
    pub venue_id: Uuid,
    #[garde(skip)]
    pub rating: Decimal,
    #[garde(length(max = 5000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateReview {
    #[garde(skip)]
    pub rating: Decimal,
    #[garde(length(max = 5000))]
    pub comment: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: i64,
    venue_id: Uuid,
    user_id: i64,
    rating: i64,
    comment: String,
    created: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub venue_id: Uuid,
    pub user_id: i64,
    pub rating: Rating,
    pub comment: String,
    pub created: time::PrimitiveDateTime,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            venue_id: row.venue_id,
            user_id: row.user_id,
            rating: Rating::from_stored(row.rating),
            comment: row.comment,
            created: row.created,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertOutcome {
    pub created: bool,
    pub review: Review,
}

#[derive(Debug, sqlx::FromRow)]
struct VenueReviewRow {
    id: i64,
    user_id: i64,
    user_name: String,
    rating: i64,
    comment: String,
    created: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueReview {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub rating: Rating,
    pub comment: String,
    pub created: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueReviews {
    pub reviews: Vec<VenueReview>,
    pub current_user_id: Option<i64>,
}

const REVIEW_FIELDS: &str = "id, venue_id, user_id, rating, comment, created";

async fn get<'c, E>(id: i64, executor: E) -> Result<Review>
where
    E: sqlx::Executor<'c, Database = ChosenDB>,
{
    let row =
        sqlx::query_as::<_, ReviewRow>(&format!("SELECT {REVIEW_FIELDS} FROM review WHERE id = ?"))
            .bind(id)
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| Error::not_found("Review"))?;
    Ok(row.into())
}

/// Locks the venue the review belongs to, also the existence check
async fn lock_review(conn: &mut ChosenConnection, id: i64) -> Result<Review> {
    let res = sqlx::query(
        "UPDATE venue SET rating = rating WHERE id = (SELECT venue_id FROM review WHERE id = ?)",
    )
    .bind(id)
    .execute(&mut *conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(Error::not_found("Review"));
    }
    get(id, &mut *conn).await
}

fn check_author(caller: &Caller, review: &Review) -> Result<()> {
    if caller.can_manage(Some(review.user_id)) {
        Ok(())
    } else {
        Err(Error::forbidden("Review belongs to other user"))
    }
}

fn map_write_error(e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            Error::not_found("User")
        }
        _ => Error::from(e),
    }
}

pub type ReviewRepository = ReviewRepositoryImpl<Pool<ChosenDB>>;

pub struct ReviewRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> ReviewRepositoryImpl<E>
where
    for<'a> &'a E:
        sqlx::Executor<'c, Database = ChosenDB> + sqlx::Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Creates or replaces the user's review of the venue and recomputes the
    /// venue rating before commit
    pub async fn upsert(&self, user_id: i64, payload: UpsertReview) -> Result<UpsertOutcome> {
        let rating = Rating::try_from(payload.rating)?;
        let comment = payload.comment.unwrap_or_default();
        let venue_id = payload.venue_id;

        let mut tx = self.executor.begin().await?;
        lock_venue(&mut *tx, venue_id).await?;
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM review WHERE user_id = ? AND venue_id = ?")
                .bind(user_id)
                .bind(venue_id)
                .fetch_optional(&mut *tx)
                .await?;

        let (id, created) = match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE review SET rating = ?, comment = ?, created = CURRENT_TIMESTAMP WHERE id = ?",
                )
                .bind(rating.tenths())
                .bind(&comment)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                (id, false)
            }
            None => {
                let res = sqlx::query(
                    "INSERT INTO review (venue_id, user_id, rating, comment) VALUES (?, ?, ?, ?)",
                )
                .bind(venue_id)
                .bind(user_id)
                .bind(rating.tenths())
                .bind(&comment)
                .execute(&mut *tx)
                .await
                .map_err(map_write_error)?;
                (res.last_insert_rowid(), true)
            }
        };

        recompute_venue_rating(&mut *tx, venue_id).await?;
        let review = get(id, &mut *tx).await?;
        tx.commit().await?;
        info!(
            "User {user_id} {} review {id} of venue {venue_id} with rating {rating}",
            if created { "created" } else { "updated" }
        );
        Ok(UpsertOutcome { created, review })
    }

    pub async fn update(&self, caller: Caller, id: i64, payload: UpdateReview) -> Result<Review> {
        let rating = Rating::try_from(payload.rating)?;
        let mut tx = self.executor.begin().await?;
        let review = lock_review(&mut *tx, id).await?;
        check_author(&caller, &review)?;
        sqlx::query("UPDATE review SET rating = ?, comment = ? WHERE id = ?")
            .bind(rating.tenths())
            .bind(payload.comment.unwrap_or_default())
            .bind(id)
            .execute(&mut *tx)
            .await?;
        recompute_venue_rating(&mut *tx, review.venue_id).await?;
        let review = get(id, &mut *tx).await?;
        tx.commit().await?;
        info!("Review {id} updated with rating {rating}");
        Ok(review)
    }

    pub async fn delete(&self, caller: Caller, id: i64) -> Result<()> {
        let mut tx = self.executor.begin().await?;
        let review = lock_review(&mut *tx, id).await?;
        check_author(&caller, &review)?;
        sqlx::query("DELETE FROM review WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        recompute_venue_rating(&mut *tx, review.venue_id).await?;
        tx.commit().await?;
        info!("Review {id} of venue {} deleted", review.venue_id);
        Ok(())
    }

    /// Recomputes venue rating from its current reviews
    pub async fn recompute(&self, venue_id: Uuid) -> Result<Rating> {
        let mut tx = self.executor.begin().await?;
        lock_venue(&mut *tx, venue_id).await?;
        let rating = recompute_venue_rating(&mut *tx, venue_id).await?;
        tx.commit().await?;
        Ok(rating)
    }

    /// Reviews of the venue, newest first
    pub async fn list_for_venue(&self, venue_id: Uuid) -> Result<Vec<VenueReview>> {
        let mut conn = self.executor.acquire().await?;
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM venue WHERE id = ?")
            .bind(venue_id)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            return Err(Error::not_found("Venue"));
        }
        let rows = sqlx::query_as::<_, VenueReviewRow>(
            "SELECT r.id, r.user_id, u.name AS user_name, r.rating, r.comment, r.created
            FROM review r JOIN users u ON r.user_id = u.id
            WHERE r.venue_id = ?
            ORDER BY r.created DESC, r.id DESC",
        )
        .bind(venue_id)
        .fetch_all(&mut *conn)
        .await?;
        debug!("Found {} reviews for venue {venue_id}", rows.len());

        Ok(rows
            .into_iter()
            .map(|row| VenueReview {
                id: row.id,
                user_id: row.user_id,
                user_name: row.user_name,
                rating: Rating::from_stored(row.rating),
                comment: row.comment,
                created: row.created,
            })
            .collect())
    }

    pub async fn get(&self, id: i64) -> Result<Review> {
        get(id, &self.executor).await
    }
}
