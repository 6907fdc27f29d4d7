#![allow(dead_code)]

use std::str::FromStr as _;

use lapangin_dal::{
    Pool,
    venue::{CreateVenue, Venue, VenueRepository},
};
use rust_decimal::Decimal;

pub async fn init_db() -> Pool {
    const DB_URL: &str = "sqlite::memory:";
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect(DB_URL)
        .await
        .unwrap();
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await
        .unwrap();
    lapangin_dal::migrate(&pool).await.unwrap();
    pool
}

/// Inserts user directly, password hashing is not needed here
pub async fn add_user(pool: &Pool, name: &str, roles: &str) -> i64 {
    sqlx::query("INSERT INTO users (name, email, roles) VALUES (?, ?, ?)")
        .bind(name)
        .bind(format!("{name}@example.com"))
        .bind(roles)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

pub fn venue_payload(name: &str, city: &str, capacity: i64, price: &str) -> CreateVenue {
    CreateVenue {
        name: name.to_string(),
        city: city.to_string(),
        country: "Indonesia".to_string(),
        home_teams: None,
        capacity,
        price: Decimal::from_str(price).unwrap(),
        thumbnail: None,
        description: Some(format!("{name} in {city}")),
    }
}

pub async fn add_venue(pool: &Pool, name: &str, owner_id: Option<i64>) -> Venue {
    VenueRepository::new(pool.clone())
        .create(venue_payload(name, "Jakarta", 1000, "150.00"), owner_id)
        .await
        .unwrap()
}
