//! Storage tests against a live MongoDB replica set.
//!
//! Set `TEST_MONGODB_URI` (e.g. `mongodb://127.0.0.1:27017/?replicaSet=rs0`) to
//! run them; without it every test returns immediately.

use std::collections::HashSet;

use actix_web::{http::StatusCode, test, web, App, ResponseError};
use chrono::NaiveDate;
use futures::{future::join_all, FutureExt};
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde_json::{json, Value};

use travel_desk::{
    auth::issue_token,
    config::Config,
    db::{
        children::{sync_children, ChildInput},
        collections,
        numbering::{DocumentKind, NumberGenerator},
        MongoDB,
    },
    error::AppError,
    models::User,
    routes,
};

async fn connect() -> Option<MongoDB> {
    let uri = std::env::var("TEST_MONGODB_URI").ok()?;
    let name = format!("travel_desk_test_{}", ObjectId::new().to_hex());
    Some(MongoDB::new(&uri, &name).await.unwrap())
}

/// Bearer header for an owner of `agency` holding every permission.
fn owner_of(agency: ObjectId) -> (&'static str, String) {
    let user = User {
        id: Some(ObjectId::new()),
        agency_id: Some(agency),
        branch_id: None,
        role_id: None,
        name: "Owner".into(),
        email: format!("owner-{}@desk.test", agency.to_hex()),
        phone: None,
        password: String::new(),
        platform_admin: false,
        active: true,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    };
    let token = issue_token(&user, "Owner", vec!["*".into()], &Config::default()).unwrap();
    ("Authorization", format!("Bearer {token}"))
}

macro_rules! live_app {
    ($db:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($db.clone()))
                .app_data(web::Data::new(Config::default()))
                .configure(routes::configure),
        )
        .await
    };
}

macro_rules! send {
    ($app:expr, $method:ident, $uri:expr, $agency:expr) => {{
        let req = test::TestRequest::$method()
            .uri(&$uri)
            .insert_header(owner_of($agency))
            .to_request();
        test::call_service(&$app, req).await
    }};
    ($app:expr, $method:ident, $uri:expr, $agency:expr, $body:expr) => {{
        let req = test::TestRequest::$method()
            .uri(&$uri)
            .insert_header(owner_of($agency))
            .set_json($body)
            .to_request();
        test::call_service(&$app, req).await
    }};
}

/// Sends a create and returns the new record's id.
macro_rules! created {
    ($app:expr, $uri:expr, $agency:expr, $body:expr) => {{
        let resp = send!($app, post, $uri, $agency, $body);
        assert_eq!(resp.status(), StatusCode::CREATED, "POST {}", $uri);
        let body: Value = test::read_body_json(resp).await;
        body["id"].as_str().unwrap().to_string()
    }};
}

async fn count(db: &MongoDB, collection: &str, filter: Document) -> u64 {
    db.documents(collection).count_documents(filter, None).await.unwrap()
}

#[derive(Clone)]
struct Stop {
    id: Option<String>,
    place: &'static str,
}

impl ChildInput for Stop {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! { "place": self.place })
    }
}

#[actix_web::test]
async fn concurrent_receipts_get_distinct_numbers() {
    let Some(db) = connect().await else { return };
    let agency = ObjectId::new();
    let numbers = NumberGenerator::new(4);
    let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();

    let takes = (0..40).map(|_| {
        db.with_transaction(|session| {
            let db = db.clone();
            async move {
                numbers
                    .next(&db, session, Some(agency), DocumentKind::Receipt, date)
                    .await
            }
            .boxed()
        })
    });
    let taken: Vec<String> = join_all(takes)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    let unique: HashSet<&String> = taken.iter().collect();
    assert_eq!(unique.len(), 40);
    assert!(taken.contains(&"RCT/2026-27/0001".to_string()));
    assert!(taken.contains(&"RCT/2026-27/0040".to_string()));
}

#[actix_web::test]
async fn agencies_number_independently() {
    let Some(db) = connect().await else { return };
    let numbers = NumberGenerator::new(4);
    let date = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();

    for agency in [ObjectId::new(), ObjectId::new()] {
        let number = db
            .with_transaction(|session| {
                let db = db.clone();
                async move {
                    numbers
                        .next(&db, session, Some(agency), DocumentKind::Booking, date)
                        .await
                }
                .boxed()
            })
            .await
            .unwrap();
        assert_eq!(number, "BK/2026/00001");
    }
}

#[actix_web::test]
async fn aborted_transaction_releases_nothing() {
    let Some(db) = connect().await else { return };
    let agency = ObjectId::new();
    let numbers = NumberGenerator::new(4);
    let date = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();

    let failed = db
        .with_transaction(|session| {
            let db = db.clone();
            async move {
                numbers
                    .next(&db, session, Some(agency), DocumentKind::Invoice, date)
                    .await?;
                Err::<String, _>(AppError::Conflict("rolled back".into()))
            }
            .boxed()
        })
        .await;
    assert!(matches!(failed, Err(AppError::Conflict(_))));

    let number = db
        .with_transaction(|session| {
            let db = db.clone();
            async move {
                numbers
                    .next(&db, session, Some(agency), DocumentKind::Invoice, date)
                    .await
            }
            .boxed()
        })
        .await
        .unwrap();
    assert_eq!(number, "INV/2026-27/0001");
}

#[actix_web::test]
async fn child_sync_updates_inserts_and_removes() {
    let Some(db) = connect().await else { return };
    let agency = ObjectId::new();
    let parent = ObjectId::new();
    let db = &db;

    let sync = |stops: Vec<Stop>| {
        db.with_transaction(move |session| {
            let db = db.clone();
            let stops = stops.clone();
            async move {
                sync_children(
                    &db,
                    session,
                    collections::VEHICLE_ITINERARIES,
                    "vehicle_booking_id",
                    parent,
                    agency,
                    &stops,
                )
                .await
            }
            .boxed()
        })
    };

    sync(vec![
        Stop { id: None, place: "Manali" },
        Stop { id: None, place: "Rohtang" },
    ])
    .await
    .unwrap();

    let stored = db
        .documents(collections::VEHICLE_ITINERARIES)
        .find_one(doc! { "vehicle_booking_id": parent, "place": "Manali" }, None)
        .await
        .unwrap()
        .unwrap();
    let manali = stored.get_object_id("_id").unwrap().to_hex();

    sync(vec![
        Stop { id: Some(manali), place: "Manali Old Town" },
        Stop { id: None, place: "Solang" },
    ])
    .await
    .unwrap();

    let cursor = db
        .documents(collections::VEHICLE_ITINERARIES)
        .find(doc! { "vehicle_booking_id": parent }, None)
        .await
        .unwrap();
    let mut places: Vec<String> = travel_desk::db::collect(cursor)
        .await
        .unwrap()
        .iter()
        .map(|d| d.get_str("place").unwrap().to_string())
        .collect();
    places.sort();
    assert_eq!(places, ["Manali Old Town", "Solang"]);

    let stranger = Stop { id: Some(ObjectId::new().to_hex()), place: "Leh" };
    assert!(matches!(sync(vec![stranger]).await, Err(AppError::BadRequest(_))));
}

#[actix_web::test]
async fn reference_names_are_unique_per_agency_ignoring_case() {
    let Some(db) = connect().await else { return };
    let app = live_app!(db);
    let (agency, other) = (ObjectId::new(), ObjectId::new());

    created!(app, "/api/countries", agency, json!({ "name": "India" }));
    let resp = send!(app, post, "/api/countries", agency, json!({ "name": "INDIA" }));
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    created!(app, "/api/countries", other, json!({ "name": "India" }));
}

#[actix_web::test]
async fn state_names_are_unique_within_their_country() {
    let Some(db) = connect().await else { return };
    let app = live_app!(db);
    let agency = ObjectId::new();

    let india = created!(app, "/api/countries", agency, json!({ "name": "India" }));
    let nepal = created!(app, "/api/countries", agency, json!({ "name": "Nepal" }));
    created!(app, "/api/states", agency, json!({ "country_id": india, "name": "Goa" }));

    let resp = send!(
        app,
        post,
        "/api/states",
        agency,
        json!({ "country_id": india, "name": "goa" })
    );
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    created!(app, "/api/states", agency, json!({ "country_id": nepal, "name": "Goa" }));
}

#[actix_web::test]
async fn unique_index_rejects_case_variants() {
    let Some(db) = connect().await else { return };
    db.ensure_indexes().await.unwrap();
    let agency = ObjectId::new();
    let countries = db.documents(collections::COUNTRIES);

    countries
        .insert_one(doc! { "agency_id": agency, "name": "Bhutan" }, None)
        .await
        .unwrap();
    let err: AppError = countries
        .insert_one(doc! { "agency_id": agency, "name": "BHUTAN" }, None)
        .await
        .unwrap_err()
        .into();
    assert_eq!(err.status_code(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn referenced_rows_cannot_be_deleted() {
    let Some(db) = connect().await else { return };
    let app = live_app!(db);
    let agency = ObjectId::new();

    let country = created!(app, "/api/countries", agency, json!({ "name": "Sri Lanka" }));
    let state = created!(
        app,
        "/api/states",
        agency,
        json!({ "country_id": country, "name": "Central" })
    );

    let resp = send!(app, delete, format!("/api/countries/{country}"), agency);
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "CONFLICT");

    let resp = send!(app, delete, format!("/api/states/{state}"), agency);
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = send!(app, delete, format!("/api/countries/{country}"), agency);
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn deleting_a_client_removes_family() {
    let Some(db) = connect().await else { return };
    let app = live_app!(db);
    let agency = ObjectId::new();

    let client = created!(
        app,
        "/api/clients",
        agency,
        json!({
            "name": "Ravi Menon",
            "phone": "9820012345",
            "family_friends": [
                { "name": "Anita Menon", "relation": "Spouse" },
                { "name": "Kiran Menon", "relation": "Son" }
            ]
        })
    );
    let client_id = ObjectId::parse_str(&client).unwrap();
    assert_eq!(count(&db, collections::FAMILY_FRIENDS, doc! { "client_id": client_id }).await, 2);

    let resp = send!(app, delete, format!("/api/clients/{client}"), agency);
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(count(&db, collections::FAMILY_FRIENDS, doc! { "client_id": client_id }).await, 0);
}

#[actix_web::test]
async fn deleting_a_booking_removes_details_and_follow_ups() {
    let Some(db) = connect().await else { return };
    let app = live_app!(db);
    let agency = ObjectId::new();

    let client = created!(
        app,
        "/api/clients",
        agency,
        json!({ "name": "Farah Khan", "phone": "9820054321" })
    );
    let booking = created!(
        app,
        "/api/bookings",
        agency,
        json!({
            "client_id": client,
            "destination": "Kashmir",
            "travel_date": "2027-04-10",
            "adults": 2,
            "details": [
                { "description": "Houseboat, 2 nights", "quantity": 2, "rate": 7000.0 },
                { "description": "Gondola tickets", "rate": 1800.0 }
            ]
        })
    );
    let resp = send!(
        app,
        post,
        format!("/api/bookings/{booking}/follow-ups"),
        agency,
        json!({ "follow_up_date": "2027-03-01", "remark": "Send quote" })
    );
    assert_eq!(resp.status(), StatusCode::CREATED);

    let booking_id = ObjectId::parse_str(&booking).unwrap();
    let owned = doc! { "booking_id": booking_id };
    assert_eq!(count(&db, collections::TOUR_BOOKING_DETAILS, owned.clone()).await, 2);
    assert_eq!(count(&db, collections::FOLLOW_UPS, owned.clone()).await, 1);

    let resp = send!(app, delete, format!("/api/bookings/{booking}"), agency);
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(count(&db, collections::TOUR_BOOKING_DETAILS, owned.clone()).await, 0);
    assert_eq!(count(&db, collections::FOLLOW_UPS, owned).await, 0);
}

#[actix_web::test]
async fn booking_details_must_name_services_of_the_agency() {
    let Some(db) = connect().await else { return };
    let app = live_app!(db);
    let (agency, other) = (ObjectId::new(), ObjectId::new());

    let client = created!(
        app,
        "/api/clients",
        agency,
        json!({ "name": "Joseph DSouza", "phone": "9820099887" })
    );
    let foreign = created!(app, "/api/services", other, json!({ "name": "Visa assistance" }));
    let own = created!(app, "/api/services", agency, json!({ "name": "Visa assistance" }));

    let booking = |service: &str| {
        json!({
            "client_id": client,
            "destination": "Dubai",
            "travel_date": "2027-01-05",
            "adults": 1,
            "details": [{ "service_id": service, "description": "Tourist visa", "rate": 6500.0 }]
        })
    };

    let resp = send!(app, post, "/api/bookings", agency, booking(foreign.as_str()));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = send!(app, post, "/api/bookings", agency, booking(ObjectId::new().to_hex().as_str()));
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    created!(app, "/api/bookings", agency, booking(own.as_str()));
}

#[actix_web::test]
async fn deleting_a_vehicle_booking_removes_its_legs() {
    let Some(db) = connect().await else { return };
    let app = live_app!(db);
    let agency = ObjectId::new();

    let client = created!(
        app,
        "/api/clients",
        agency,
        json!({ "name": "Priya Nair", "phone": "9820011223" })
    );
    let vehicle = created!(
        app,
        "/api/vehicle-bookings",
        agency,
        json!({
            "client_id": client,
            "vehicle_type": "Innova Crysta",
            "pickup_date": "2027-05-01",
            "drop_date": "2027-05-03",
            "pickup_point": "Bagdogra airport",
            "passengers": 4,
            "amount": 14500.0,
            "itineraries": [
                { "day": 1, "date": "2027-05-01", "from_place": "Bagdogra", "to_place": "Gangtok" },
                { "day": 3, "date": "2027-05-03", "from_place": "Gangtok", "to_place": "Bagdogra" }
            ]
        })
    );
    let vehicle_id = ObjectId::parse_str(&vehicle).unwrap();
    let owned = doc! { "vehicle_booking_id": vehicle_id };
    assert_eq!(count(&db, collections::VEHICLE_ITINERARIES, owned.clone()).await, 2);

    let resp = send!(app, delete, format!("/api/vehicle-bookings/{vehicle}"), agency);
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(count(&db, collections::VEHICLE_ITINERARIES, owned).await, 0);
}

#[actix_web::test]
async fn group_bookings_start_as_enquiries() {
    let Some(db) = connect().await else { return };
    let app = live_app!(db);
    let agency = ObjectId::new();

    let resp = send!(
        app,
        post,
        "/api/group-bookings",
        agency,
        json!({
            "group_name": "Rotary Club Pune",
            "destination": "Bhutan",
            "travel_date": "2027-10-02",
            "status": "cancelled"
        })
    );
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "enquiry");
}
