use lapangin_dal::faq::{Faq, FaqCategory};
use lapangin_e2e_tests::{
    TestUser, extend_url, launch_env, prepare_env,
    rest::{create_faq, error_kind},
    user_client,
};
use reqwest::StatusCode;
use serde_json::json;
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn test_faq() {
    let (args, _config_guard) = prepare_env("test_faq").await.unwrap();
    let config = args.clone();
    let (admin, base_url) = launch_env(args, TestUser::Admin).await.unwrap();
    let (user, _) = user_client(&config, TestUser::User).await.unwrap();
    let anonymous = reqwest::Client::new();

    let refund = create_faq(&admin, &base_url, "Can I get a refund?", "payment")
        .await
        .unwrap();
    assert_eq!(refund.category, FaqCategory::Payment);
    create_faq(&admin, &base_url, "How do I book?", "booking")
        .await
        .unwrap();
    create_faq(&admin, &base_url, "Where do I pay?", "payment")
        .await
        .unwrap();

    let response = user
        .post(extend_url(&base_url, "api/faq"))
        .json(&json!({"question": "Mine?", "answer": "No", "category": "general"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = admin
        .post(extend_url(&base_url, "api/faq"))
        .json(&json!({"question": "", "answer": "Empty", "category": "general"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_kind(response).await.unwrap(), "InvalidInput");

    let response = anonymous
        .get(extend_url(&base_url, "api/faq"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let all: Vec<Faq> = response.json().await.unwrap();
    assert_eq!(all.len(), 3);

    let response = anonymous
        .get(extend_url(&base_url, "api/faq?category=payment"))
        .send()
        .await
        .unwrap();
    let payment: Vec<Faq> = response.json().await.unwrap();
    assert_eq!(payment.len(), 2);
    assert!(payment.iter().all(|f| f.category == FaqCategory::Payment));

    let url = extend_url(&base_url, format!("api/faq/{}", refund.id));
    let response = admin
        .put(url.clone())
        .json(&json!({"question": "Can I get my money back?", "answer": "Within 24 hours", "category": "payment"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Faq = response.json().await.unwrap();
    assert_eq!(updated.question, "Can I get my money back?");

    let response = anonymous.get(url.clone()).send().await.unwrap();
    let fetched: Faq = response.json().await.unwrap();
    assert_eq!(fetched.answer, "Within 24 hours");

    let response = anonymous.delete(url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = admin.delete(url.clone()).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = anonymous.get(url).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
