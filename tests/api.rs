//! HTTP-level checks that are answered before the database is touched.
//!
//! The MongoDB client connects lazily and points at a closed port, so any
//! request that did reach the database would fail with a 5xx.

use actix_web::{http::StatusCode, test, web, App};
use mongodb::bson::{oid::ObjectId, DateTime};
use serde_json::{json, Value};

use travel_desk::{
    auth::issue_token,
    config::Config,
    db::MongoDB,
    models::User,
    routes,
};

const UNREACHABLE: &str = "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200";

fn staff(platform_admin: bool) -> User {
    User {
        id: Some(ObjectId::new()),
        agency_id: (!platform_admin).then(ObjectId::new),
        branch_id: None,
        role_id: None,
        name: "Meera Iyer".into(),
        email: "meera@sunrise-travels.test".into(),
        phone: None,
        password: String::new(),
        platform_admin,
        active: true,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    }
}

fn token(permissions: &[&str]) -> String {
    let permissions = permissions.iter().map(|p| p.to_string()).collect();
    issue_token(&staff(false), "Sales", permissions, &Config::default()).unwrap()
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

macro_rules! app {
    () => {{
        let db = MongoDB::new(UNREACHABLE, "travel_desk_test").await.unwrap();
        test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(Config::default()))
                .configure(routes::configure),
        )
        .await
    }};
}

#[actix_web::test]
async fn missing_token_is_unauthorized() {
    let app = app!();
    let req = test::TestRequest::get().uri("/api/clients").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[actix_web::test]
async fn garbage_token_is_unauthorized() {
    let app = app!();
    let req = test::TestRequest::get()
        .uri("/api/bookings")
        .insert_header(bearer("not.a.jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn token_signed_with_other_secret_is_unauthorized() {
    let app = app!();
    let other = Config {
        jwt_secret: "someone-elses-secret".into(),
        ..Config::default()
    };
    let forged = issue_token(&staff(false), "Owner", vec!["*".into()], &other).unwrap();
    let req = test::TestRequest::get()
        .uri("/api/clients")
        .insert_header(bearer(&forged))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn missing_permission_is_forbidden() {
    let app = app!();
    let req = test::TestRequest::get()
        .uri("/api/receipts")
        .insert_header(bearer(&token(&["client.view"])))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "FORBIDDEN");
}

#[actix_web::test]
async fn agency_staff_cannot_write_packages() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/packages")
        .insert_header(bearer(&token(&["*"])))
        .set_json(json!({
            "name": "Gold",
            "price": 12000.0,
            "duration_days": 365,
            "max_users": 10,
            "max_branches": 3
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn platform_routes_reject_agency_staff() {
    let app = app!();
    let req = test::TestRequest::get()
        .uri("/api/agencies")
        .insert_header(bearer(&token(&["*"])))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn invalid_client_reports_each_field() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/clients")
        .insert_header(bearer(&token(&["client.*"])))
        .set_json(json!({ "name": "  ", "phone": "call me", "email": "nope" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"name"));
    assert!(fields.contains(&"phone"));
    assert!(fields.contains(&"email"));
}

#[actix_web::test]
async fn hotel_booking_checkout_must_follow_checkin() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/hotel-bookings")
        .insert_header(bearer(&token(&["*"])))
        .set_json(json!({
            "client_id": ObjectId::new().to_hex(),
            "hotel_id": ObjectId::new().to_hex(),
            "check_in": "2027-01-12",
            "check_out": "2027-01-12",
            "meal_plan": "MAP",
            "adults": 2,
            "amount": 9000.0
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["details"][0]["field"], "check_out");
}

#[actix_web::test]
async fn malformed_json_is_bad_request() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/bookings")
        .insert_header(bearer(&token(&["*"])))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{ destination: Goa")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[actix_web::test]
async fn unknown_status_filter_is_bad_request() {
    let app = app!();
    let req = test::TestRequest::get()
        .uri("/api/bookings?status=lost")
        .insert_header(bearer(&token(&["*"])))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn malformed_id_is_bad_request() {
    let app = app!();
    for uri in ["/api/bookings/xyz", "/api/hotels/123", "/api/receipts/zz/pdf"] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(&token(&["*"])))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[actix_web::test]
async fn registration_is_validated_before_storage() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "agency_name": "Sunrise Travels",
            "agency_email": "not-an-email",
            "agency_phone": "9820012345",
            "owner_name": "Meera Iyer",
            "owner_email": "meera@sunrise-travels.test",
            "password": "short"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["agency_email", "password"]);
}

#[actix_web::test]
async fn health_reports_unreachable_database() {
    let app = app!();
    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["database"], "down");
}
