use actix_web::{http::StatusCode, test, web, App};
use orbital_payouts::{configure, ApiConfig};
use serde_json::{json, Value};

#[actix_web::test]
async fn test_payouts_for_epoch() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ApiConfig { max_epoch: 1_000 }))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/payouts/4").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(
        body,
        json!([
            { "token": 1, "weight": 1.0 / 7.0 },
            { "token": 2, "weight": 2.0 / 7.0 },
            { "token": 4, "weight": 4.0 / 7.0 }
        ])
    );
}

#[actix_web::test]
async fn test_epoch_zero_is_empty() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ApiConfig { max_epoch: 1_000 }))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/payouts/0").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body, json!([]));
}

#[actix_web::test]
async fn test_bad_epochs_are_rejected() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ApiConfig { max_epoch: 100 }))
            .configure(configure),
    )
    .await;

    for uri in ["/payouts/abc", "/payouts/-3", "/payouts/101"] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", uri);

        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].is_string(), "{}", uri);
    }
}

#[actix_web::test]
async fn test_unbounded_config_still_rejects_huge_epochs() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ApiConfig { max_epoch: u64::MAX }))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri("/payouts/18446744073709551615")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("maximum"));
}

#[actix_web::test]
async fn test_health() {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(ApiConfig { max_epoch: 100 }))
            .configure(configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body = test::read_body(resp).await;
    assert_eq!(body, web::Bytes::from_static(b"OK\n"));
}
