use anyhow::Result;
use lapangin_dal::{booking::Booking, faq::Faq, venue::Venue};
use reqwest::{Response, StatusCode, Url};
use serde_json::json;
use time::Date;
use tracing::info;
use uuid::Uuid;

use crate::extend_url;

/// Posts any serializable payload as JSON
pub async fn post_json<T>(
    client: &reqwest::Client,
    base_url: &Url,
    path: &str,
    payload: &T,
) -> Result<Response>
where
    T: serde::Serialize + ?Sized,
{
    let response = client
        .post(extend_url(base_url, path))
        .json(payload)
        .send()
        .await?;
    Ok(response)
}

pub async fn create_venue(
    client: &reqwest::Client,
    base_url: &Url,
    name: &str,
    city: &str,
    capacity: i64,
    price: f64,
) -> Result<Venue> {
    let payload = json!({
        "name": name,
        "city": city,
        "country": "Indonesia",
        "capacity": capacity,
        "price": price,
    });
    let response = post_json(client, base_url, "api/venue", &payload).await?;
    info!("Venue Response: {:#?}", response);
    assert_eq!(response.status(), StatusCode::CREATED);

    let venue: Venue = response.json().await?;
    Ok(venue)
}

pub async fn book(
    client: &reqwest::Client,
    base_url: &Url,
    venue_id: Uuid,
    start_date: Date,
    end_date: Date,
) -> Result<Response> {
    let payload = json!({
        "venue_id": venue_id,
        "start_date": start_date,
        "end_date": end_date,
    });
    let response = post_json(client, base_url, "api/booking", &payload).await?;
    Ok(response)
}

pub async fn create_booking(
    client: &reqwest::Client,
    base_url: &Url,
    venue_id: Uuid,
    start_date: Date,
    end_date: Date,
) -> Result<Booking> {
    let response = book(client, base_url, venue_id, start_date, end_date).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let booking: Booking = response.json().await?;
    Ok(booking)
}

pub async fn review(
    client: &reqwest::Client,
    base_url: &Url,
    venue_id: Uuid,
    rating: f64,
    comment: Option<&str>,
) -> Result<Response> {
    let payload = json!({
        "venue_id": venue_id,
        "rating": rating,
        "comment": comment,
    });
    let response = post_json(client, base_url, "api/review", &payload).await?;
    Ok(response)
}

pub async fn get_venue(client: &reqwest::Client, base_url: &Url, id: Uuid) -> Result<Venue> {
    let response = client
        .get(extend_url(base_url, format!("api/venue/{id}")))
        .send()
        .await?;
    assert!(response.status().is_success());
    let venue: Venue = response.json().await?;
    Ok(venue)
}

pub async fn create_faq(
    client: &reqwest::Client,
    base_url: &Url,
    question: &str,
    category: &str,
) -> Result<Faq> {
    let payload = json!({"question": question, "answer": "See the venue page", "category": category});
    let response = post_json(client, base_url, "api/faq", &payload).await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let faq: Faq = response.json().await?;
    Ok(faq)
}

/// Consumes error response and returns its `kind`
pub async fn error_kind(response: Response) -> Result<String> {
    let body: serde_json::Value = response.json().await?;
    info!("Error body: {body}");
    Ok(body["kind"].as_str().unwrap_or_default().to_string())
}
