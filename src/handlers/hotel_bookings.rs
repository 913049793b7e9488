use actix_web::{web, HttpResponse};
use futures::FutureExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde_json::json;

use super::{inserted_id, stamp_new, today};
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{
    collections,
    numbering::{DocumentKind, NumberGenerator},
    repository::{
        by_id, date_range, ensure_references, find_page, find_scoped, scoped, with_search,
    },
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    agency::Agency,
    client::Client,
    common::{parse_id, parse_optional_id, ListQuery},
    hotel_booking::{HotelBooking, HotelBookingInput, ReservationFilter},
    reference::Hotel,
};
use crate::pdf::{documents, pdf_response};
use crate::permissions::Action;
use crate::resource::Reference;
use crate::validation::Validate;

const RESOURCE: &str = "hotel_booking";
const SEARCH_FIELDS: &[&str] = &["hrv_number", "confirmation_number", "room_type"];
const SORT_FIELDS: &[&str] = &["hrv_number", "check_in", "amount", "created_at"];
const REFERENCES: &[Reference] = &[
    Reference {
        field: "client_id",
        collection: collections::CLIENTS,
        label: "Client",
    },
    Reference {
        field: "hotel_id",
        collection: collections::HOTELS,
        label: "Hotel",
    },
    Reference {
        field: "booking_id",
        collection: collections::BOOKINGS,
        label: "Booking",
    },
];

async fn load(db: &MongoDB, id: ObjectId, agency_id: ObjectId) -> Result<HotelBooking, AppError> {
    find_scoped(
        &db.collection::<HotelBooking>(collections::HOTEL_BOOKINGS),
        id,
        Some(agency_id),
        "Hotel booking",
    )
    .await
}

/// Conditions shared by every reservation list.
pub(crate) fn reservation_conditions(
    mut conditions: Document,
    filter: &ReservationFilter,
    date_field: &str,
) -> Result<Document, AppError> {
    if let Some(status) = filter.status {
        conditions.insert("status", status.as_str());
    }
    if let Some(client_id) = parse_optional_id(filter.client_id.as_deref())? {
        conditions.insert("client_id", client_id);
    }
    if let Some(booking_id) = parse_optional_id(filter.booking_id.as_deref())? {
        conditions.insert("booking_id", booking_id);
    }
    Ok(date_range(conditions, date_field, filter.from, filter.to))
}

pub async fn list_hotel_bookings(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    filter: web::Query<ReservationFilter>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let conditions = with_search(scoped(Some(agency_id)), &query, SEARCH_FIELDS);
    let conditions = reservation_conditions(conditions, &filter, "check_in")?;
    let page = find_page(
        &db.collection::<HotelBooking>(collections::HOTEL_BOOKINGS),
        conditions,
        &query,
        SORT_FIELDS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_hotel_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    Ok(HttpResponse::Ok().json(load(&db, id, agency_id).await?))
}

pub async fn create_hotel_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    config: web::Data<Config>,
    body: web::Json<HotelBookingInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Create)?;
    let input = body.into_inner();
    input.validate()?;
    let fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;

    let numbers = NumberGenerator::new(config.fiscal_year_start_month);
    let day = today();
    let created_by = auth.id;

    let id = db
        .with_transaction(|session| {
            let db = db.get_ref().clone();
            let mut fields = fields.clone();
            async move {
                let number = numbers
                    .next(&db, session, Some(agency_id), DocumentKind::Hrv, day)
                    .await?;
                fields.insert("hrv_number", number);
                stamp_new(&mut fields, agency_id, created_by);
                inserted_id(
                    db.documents(collections::HOTEL_BOOKINGS)
                        .insert_one_with_session(fields, None, session)
                        .await?,
                )
            }
            .boxed()
        })
        .await?;

    let created = load(&db, id, agency_id).await?;
    info!("Hotel booking {} created by {}", created.hrv_number, auth.id);
    Ok(HttpResponse::Created().json(created))
}

pub async fn update_hotel_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<HotelBookingInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Update)?;
    let id = parse_id(&path)?;
    let input = body.into_inner();
    input.validate()?;
    let mut fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;
    fields.insert("updated_at", DateTime::now());

    let result = db
        .documents(collections::HOTEL_BOOKINGS)
        .update_one(by_id(id, Some(agency_id)), doc! { "$set": fields }, None)
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found("Hotel booking"));
    }
    Ok(HttpResponse::Ok().json(load(&db, id, agency_id).await?))
}

pub async fn delete_hotel_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Delete)?;
    let id = parse_id(&path)?;
    let result = db
        .documents(collections::HOTEL_BOOKINGS)
        .delete_one(by_id(id, Some(agency_id)), None)
        .await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("Hotel booking"));
    }
    info!("Hotel booking {} deleted by {}", id, auth.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Hotel booking deleted" })))
}

pub async fn hotel_voucher(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    let booking = load(&db, id, agency_id).await?;

    let agency = find_scoped(
        &db.collection::<Agency>(collections::AGENCIES),
        agency_id,
        None,
        "Agency",
    )
    .await?;
    let client = find_scoped(
        &db.collection::<Client>(collections::CLIENTS),
        booking.client_id,
        Some(agency_id),
        "Client",
    )
    .await?;
    let hotel = find_scoped(
        &db.collection::<Hotel>(collections::HOTELS),
        booking.hotel_id,
        Some(agency_id),
        "Hotel",
    )
    .await?;

    let layout = documents::hotel_voucher(&agency, &client, &hotel, &booking);
    pdf_response(&layout, &booking.hrv_number)
}
