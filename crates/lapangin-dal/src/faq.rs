use std::{fmt::Display, str::FromStr};

use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Pool;
use tracing::{info, warn};

use crate::{
    ChosenDB,
    error::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaqCategory {
    General,
    Booking,
    Payment,
    Venue,
}

impl FaqCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaqCategory::General => "general",
            FaqCategory::Booking => "booking",
            FaqCategory::Payment => "payment",
            FaqCategory::Venue => "venue",
        }
    }
}

impl Display for FaqCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaqCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "general" => Ok(FaqCategory::General),
            "booking" => Ok(FaqCategory::Booking),
            "payment" => Ok(FaqCategory::Payment),
            "venue" => Ok(FaqCategory::Venue),
            other => Err(Error::invalid(format!("Unknown FAQ category {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateFaq {
    #[garde(length(min = 1, max = 200))]
    pub question: String,
    #[garde(length(min = 1, max = 10000))]
    pub answer: String,
    #[garde(skip)]
    pub category: FaqCategory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FaqFilter {
    pub category: Option<FaqCategory>,
}

#[derive(Debug, sqlx::FromRow)]
struct FaqRow {
    id: i64,
    question: String,
    answer: String,
    category: String,
    created_by: Option<i64>,
    created: time::PrimitiveDateTime,
    modified: time::PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Faq {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub category: FaqCategory,
    pub created_by: Option<i64>,
    pub created: time::PrimitiveDateTime,
    pub modified: time::PrimitiveDateTime,
}

impl From<FaqRow> for Faq {
    fn from(row: FaqRow) -> Self {
        let category = row.category.parse().unwrap_or_else(|e| {
            warn!("FAQ {} has invalid category: {e}", row.id);
            FaqCategory::General
        });
        Faq {
            id: row.id,
            question: row.question,
            answer: row.answer,
            category,
            created_by: row.created_by,
            created: row.created,
            modified: row.modified,
        }
    }
}

const FAQ_FIELDS: &str = "id, question, answer, category, created_by, created, modified";

pub type FaqRepository = FaqRepositoryImpl<Pool<ChosenDB>>;

pub struct FaqRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> FaqRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateFaq, created_by: Option<i64>) -> Result<Faq> {
        let result = sqlx::query(
            "INSERT INTO faq (question, answer, category, created_by) VALUES (?, ?, ?, ?)",
        )
        .bind(&payload.question)
        .bind(&payload.answer)
        .bind(payload.category.as_str())
        .bind(created_by)
        .execute(&self.executor)
        .await?;
        let id = result.last_insert_rowid();
        info!("Created FAQ {id} in {}", payload.category);
        self.get(id).await
    }

    pub async fn update(&self, id: i64, payload: CreateFaq) -> Result<Faq> {
        let result = sqlx::query(
            "UPDATE faq SET question = ?, answer = ?, category = ?, modified = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(&payload.question)
        .bind(&payload.answer)
        .bind(payload.category.as_str())
        .bind(id)
        .execute(&self.executor)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found("FAQ"));
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM faq WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;
        if res.rows_affected() == 0 {
            Err(Error::not_found("FAQ"))
        } else {
            Ok(())
        }
    }

    pub async fn get(&self, id: i64) -> Result<Faq> {
        let row = sqlx::query_as::<_, FaqRow>(&format!("SELECT {FAQ_FIELDS} FROM faq WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.executor)
            .await?
            .ok_or_else(|| Error::not_found("FAQ"))?;
        Ok(row.into())
    }

    /// Newest first
    pub async fn list(&self, filter: FaqFilter) -> Result<Vec<Faq>> {
        let rows = sqlx::query_as::<_, FaqRow>(&format!(
            "SELECT {FAQ_FIELDS} FROM faq WHERE ?1 IS NULL OR category = ?1 ORDER BY created DESC, id DESC"
        ))
        .bind(filter.category.map(|c| c.as_str()))
        .fetch_all(&self.executor)
        .await?;
        Ok(rows.into_iter().map(Faq::from).collect())
    }
}
