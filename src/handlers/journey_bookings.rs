use actix_web::{web, HttpResponse};
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde::Deserialize;
use serde_json::json;

use super::{hotel_bookings::reservation_conditions, inserted_id, stamp_new};
use crate::auth::AuthUser;
use crate::db::{
    collections,
    repository::{by_id, ensure_references, find_page, find_scoped, scoped, with_search},
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    common::{parse_id, ListQuery},
    hotel_booking::ReservationFilter,
    journey_booking::{JourneyBooking, JourneyBookingInput, TravelMode},
};
use crate::permissions::Action;
use crate::resource::Reference;
use crate::validation::Validate;

const RESOURCE: &str = "journey_booking";
const SEARCH_FIELDS: &[&str] = &["from_place", "to_place", "carrier", "service_number", "pnr"];
const SORT_FIELDS: &[&str] = &["journey_date", "amount", "created_at"];
const REFERENCES: &[Reference] = &[
    Reference {
        field: "client_id",
        collection: collections::CLIENTS,
        label: "Client",
    },
    Reference {
        field: "booking_id",
        collection: collections::BOOKINGS,
        label: "Booking",
    },
];

#[derive(Deserialize, Debug, Default)]
pub struct ModeFilter {
    pub mode: Option<TravelMode>,
}

async fn load(db: &MongoDB, id: ObjectId, agency_id: ObjectId) -> Result<JourneyBooking, AppError> {
    find_scoped(
        &db.collection::<JourneyBooking>(collections::JOURNEY_BOOKINGS),
        id,
        Some(agency_id),
        "Journey booking",
    )
    .await
}

pub async fn list_journey_bookings(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    filter: web::Query<ReservationFilter>,
    mode: web::Query<ModeFilter>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let conditions = with_search(scoped(Some(agency_id)), &query, SEARCH_FIELDS);
    let mut conditions = reservation_conditions(conditions, &filter, "journey_date")?;
    if let Some(mode) = mode.mode {
        conditions.insert("mode", mode.as_str());
    }
    let page = find_page(
        &db.collection::<JourneyBooking>(collections::JOURNEY_BOOKINGS),
        conditions,
        &query,
        SORT_FIELDS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_journey_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    Ok(HttpResponse::Ok().json(load(&db, id, agency_id).await?))
}

pub async fn create_journey_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    body: web::Json<JourneyBookingInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Create)?;
    body.validate()?;
    let mut fields = body.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;
    stamp_new(&mut fields, agency_id, auth.id);

    let id = inserted_id(
        db.documents(collections::JOURNEY_BOOKINGS)
            .insert_one(fields, None)
            .await?,
    )?;
    info!(
        "Journey booking {} ({} to {}) created by {}",
        id, body.from_place, body.to_place, auth.id
    );
    Ok(HttpResponse::Created().json(load(&db, id, agency_id).await?))
}

pub async fn update_journey_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<JourneyBookingInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Update)?;
    let id = parse_id(&path)?;
    body.validate()?;
    let mut fields = body.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;
    fields.insert("updated_at", DateTime::now());

    let result = db
        .documents(collections::JOURNEY_BOOKINGS)
        .update_one(by_id(id, Some(agency_id)), doc! { "$set": fields }, None)
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found("Journey booking"));
    }
    Ok(HttpResponse::Ok().json(load(&db, id, agency_id).await?))
}

pub async fn delete_journey_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Delete)?;
    let id = parse_id(&path)?;
    let result = db
        .documents(collections::JOURNEY_BOOKINGS)
        .delete_one(by_id(id, Some(agency_id)), None)
        .await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("Journey booking"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Journey booking deleted" })))
}
