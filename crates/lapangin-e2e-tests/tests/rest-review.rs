use lapangin_dal::review::{Review, UpsertOutcome, VenueReviews};
use lapangin_e2e_tests::{
    TestUser, extend_url, launch_env, prepare_env,
    rest::{create_venue, error_kind, get_venue, review},
    user_client,
};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;
use tracing_test::traced_test;

fn rating(tenths: i64) -> Decimal {
    Decimal::new(tenths, 1)
}

#[tokio::test]
#[traced_test]
async fn test_rating_follows_reviews() {
    let (args, _config_guard) = prepare_env("test_review_rating").await.unwrap();
    let config = args.clone();
    let (provider, base_url) = launch_env(args, TestUser::Provider).await.unwrap();
    let (first, _) = user_client(&config, TestUser::User).await.unwrap();
    let (second, _) = user_client(&config, TestUser::OtherUser).await.unwrap();
    let venue = create_venue(&provider, &base_url, "Segiri", "Samarinda", 16000, 100.0)
        .await
        .unwrap();

    let response = review(&first, &base_url, venue.id, 4.0, Some("Good grass"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let first_review: UpsertOutcome = response.json().await.unwrap();
    assert!(first_review.created);

    let response = review(&second, &base_url, venue.id, 4.1, None).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let second_review: UpsertOutcome = response.json().await.unwrap();

    let anonymous = reqwest::Client::new();
    let current = get_venue(&anonymous, &base_url, venue.id).await.unwrap();
    assert_eq!(current.rating.as_decimal(), rating(41));

    let url = extend_url(&base_url, format!("api/review/{}", second_review.review.id));
    let response = second.delete(url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let current = get_venue(&anonymous, &base_url, venue.id).await.unwrap();
    assert_eq!(current.rating.as_decimal(), rating(40));

    let url = extend_url(&base_url, format!("api/review/{}", first_review.review.id));
    let response = first.delete(url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let current = get_venue(&anonymous, &base_url, venue.id).await.unwrap();
    assert_eq!(current.rating.as_decimal(), Decimal::ZERO);
}

#[tokio::test]
#[traced_test]
async fn test_second_review_replaces_first() {
    let (args, _config_guard) = prepare_env("test_review_upsert").await.unwrap();
    let config = args.clone();
    let (provider, base_url) = launch_env(args, TestUser::Provider).await.unwrap();
    let (user, user_record) = user_client(&config, TestUser::User).await.unwrap();
    let user_record = user_record.unwrap();
    let venue = create_venue(&provider, &base_url, "Kapten Dipta", "Gianyar", 18000, 120.0)
        .await
        .unwrap();

    let response = review(&user, &base_url, venue.id, 2.0, Some("Muddy"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: UpsertOutcome = response.json().await.unwrap();

    let response = review(&user, &base_url, venue.id, 4.5, Some("Fixed the pitch"))
        .await
        .unwrap();
    info!("Upsert Response: {:#?}", response);
    assert_eq!(response.status(), StatusCode::OK);
    let replaced: UpsertOutcome = response.json().await.unwrap();
    assert!(!replaced.created);
    assert_eq!(replaced.review.id, created.review.id);
    assert_eq!(replaced.review.comment, "Fixed the pitch");

    let response = user
        .get(extend_url(&base_url, format!("api/venue/{}/reviews", venue.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing: VenueReviews = response.json().await.unwrap();
    assert_eq!(listing.current_user_id, Some(user_record.id));
    assert_eq!(listing.reviews.len(), 1);
    assert_eq!(listing.reviews[0].user_name, "user");
    assert_eq!(listing.reviews[0].rating.as_decimal(), rating(45));

    let response = reqwest::Client::new()
        .get(extend_url(&base_url, format!("api/venue/{}/reviews", venue.id)))
        .send()
        .await
        .unwrap();
    let listing: VenueReviews = response.json().await.unwrap();
    assert_eq!(listing.current_user_id, None);

    let current = get_venue(&user, &base_url, venue.id).await.unwrap();
    assert_eq!(current.rating.as_decimal(), rating(45));
}

#[tokio::test]
#[traced_test]
async fn test_review_rules() {
    let (args, _config_guard) = prepare_env("test_review_rules").await.unwrap();
    let config = args.clone();
    let (provider, base_url) = launch_env(args, TestUser::Provider).await.unwrap();
    let (author, _) = user_client(&config, TestUser::User).await.unwrap();
    let (other, _) = user_client(&config, TestUser::OtherUser).await.unwrap();
    let (admin, _) = user_client(&config, TestUser::Admin).await.unwrap();
    let venue = create_venue(&provider, &base_url, "Maguwoharjo", "Sleman", 31000, 90.0)
        .await
        .unwrap();

    for invalid in [5.5, -1.0, 3.25] {
        let response = review(&author, &base_url, venue.id, invalid, None)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{invalid}");
        assert_eq!(error_kind(response).await.unwrap(), "InvalidInput");
    }

    let response = review(&author, &base_url, uuid::Uuid::new_v4(), 3.0, None)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = review(&reqwest::Client::new(), &base_url, venue.id, 3.0, None)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = review(&author, &base_url, venue.id, 3.0, Some("Ok"))
        .await
        .unwrap();
    let outcome: UpsertOutcome = response.json().await.unwrap();
    let url = extend_url(&base_url, format!("api/review/{}", outcome.review.id));

    let response = other
        .put(url.clone())
        .json(&json!({"rating": 1.0, "comment": "Bad"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = other.delete(url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = admin
        .put(url.clone())
        .json(&json!({"rating": 1.5, "comment": "Moderated"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let moderated: Review = response.json().await.unwrap();
    assert_eq!(moderated.rating.as_decimal(), rating(15));
    let current = get_venue(&admin, &base_url, venue.id).await.unwrap();
    assert_eq!(current.rating.as_decimal(), rating(15));

    let response = admin.delete(url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let current = get_venue(&admin, &base_url, venue.id).await.unwrap();
    assert_eq!(current.rating.as_decimal(), Decimal::ZERO);
}
