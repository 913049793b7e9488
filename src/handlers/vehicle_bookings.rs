use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use futures::FutureExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde_json::json;

use super::{hotel_bookings::reservation_conditions, inserted_id, stamp_new, today};
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{
    children::{delete_children, sync_children},
    collections,
    numbering::{DocumentKind, NumberGenerator},
    repository::{
        by_id, ensure_all_exist, ensure_references, find_all, find_page, find_scoped, scoped,
        with_search,
    },
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    agency::Agency,
    client::Client,
    common::{parse_id, ListQuery},
    hotel_booking::ReservationFilter,
    reference::Hotel,
    vehicle_booking::{
        VehicleBooking, VehicleBookingDetail, VehicleBookingInput, VehicleHotelBooking,
        VehicleItinerary,
    },
};
use crate::pdf::{documents, pdf_response};
use crate::permissions::Action;
use crate::resource::Reference;
use crate::validation::Validate;

const RESOURCE: &str = "vehicle_booking";
const SEARCH_FIELDS: &[&str] = &[
    "hrv_number",
    "vehicle_type",
    "vehicle_number",
    "driver_name",
    "pickup_point",
];
const SORT_FIELDS: &[&str] = &["hrv_number", "pickup_date", "amount", "created_at"];
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

async fn detail(
    db: &MongoDB,
    id: ObjectId,
    agency_id: ObjectId,
) -> Result<VehicleBookingDetail, AppError> {
    let booking = find_scoped(
        &db.collection::<VehicleBooking>(collections::VEHICLE_BOOKINGS),
        id,
        Some(agency_id),
        "Vehicle booking",
    )
    .await?;
    let itineraries = find_all(
        &db.collection::<VehicleItinerary>(collections::VEHICLE_ITINERARIES),
        doc! { "vehicle_booking_id": id },
        doc! { "day": 1, "date": 1 },
    )
    .await?;
    let hotels = find_all(
        &db.collection::<VehicleHotelBooking>(collections::VEHICLE_HOTEL_BOOKINGS),
        doc! { "vehicle_booking_id": id },
        doc! { "check_in": 1 },
    )
    .await?;
    Ok(VehicleBookingDetail {
        booking,
        itineraries,
        hotels,
    })
}

const HOTEL_STAY: Reference = Reference {
    field: "hotels",
    collection: collections::HOTELS,
    label: "Hotel",
};

pub async fn list_vehicle_bookings(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    filter: web::Query<ReservationFilter>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let conditions = with_search(scoped(Some(agency_id)), &query, SEARCH_FIELDS);
    let conditions = reservation_conditions(conditions, &filter, "pickup_date")?;
    let page = find_page(
        &db.collection::<VehicleBooking>(collections::VEHICLE_BOOKINGS),
        conditions,
        &query,
        SORT_FIELDS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_vehicle_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    Ok(HttpResponse::Ok().json(detail(&db, id, agency_id).await?))
}

pub async fn create_vehicle_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    config: web::Data<Config>,
    body: web::Json<VehicleBookingInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Create)?;
    let input = body.into_inner();
    input.validate()?;
    let fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;
    ensure_all_exist(&db, agency_id, input.hotel_ids()?, &HOTEL_STAY).await?;

    let numbers = NumberGenerator::new(config.fiscal_year_start_month);
    let day = today();
    let created_by = auth.id;

    let id = db
        .with_transaction(|session| {
            let db = db.get_ref().clone();
            let mut fields = fields.clone();
            let itineraries = input.itineraries.clone();
            let hotels = input.hotels.clone();
            async move {
                let number = numbers
                    .next(&db, session, Some(agency_id), DocumentKind::Hrv, day)
                    .await?;
                fields.insert("hrv_number", number);
                stamp_new(&mut fields, agency_id, created_by);
                let id = inserted_id(
                    db.documents(collections::VEHICLE_BOOKINGS)
                        .insert_one_with_session(fields, None, session)
                        .await?,
                )?;
                sync_children(
                    &db,
                    session,
                    collections::VEHICLE_ITINERARIES,
                    "vehicle_booking_id",
                    id,
                    agency_id,
                    &itineraries,
                )
                .await?;
                sync_children(
                    &db,
                    session,
                    collections::VEHICLE_HOTEL_BOOKINGS,
                    "vehicle_booking_id",
                    id,
                    agency_id,
                    &hotels,
                )
                .await?;
                Ok::<_, AppError>(id)
            }
            .boxed()
        })
        .await?;

    let created = detail(&db, id, agency_id).await?;
    info!(
        "Vehicle booking {} created by {}",
        created.booking.hrv_number, auth.id
    );
    Ok(HttpResponse::Created().json(created))
}

pub async fn update_vehicle_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<VehicleBookingInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Update)?;
    let id = parse_id(&path)?;
    let input = body.into_inner();
    input.validate()?;
    let fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;
    ensure_all_exist(&db, agency_id, input.hotel_ids()?, &HOTEL_STAY).await?;

    db.with_transaction(|session| {
        let db = db.get_ref().clone();
        let mut fields = fields.clone();
        let itineraries = input.itineraries.clone();
        let hotels = input.hotels.clone();
        async move {
            fields.insert("updated_at", DateTime::now());
            let result = db
                .documents(collections::VEHICLE_BOOKINGS)
                .update_one_with_session(
                    by_id(id, Some(agency_id)),
                    doc! { "$set": fields },
                    None,
                    session,
                )
                .await?;
            if result.matched_count == 0 {
                return Err(AppError::not_found("Vehicle booking"));
            }
            sync_children(
                &db,
                session,
                collections::VEHICLE_ITINERARIES,
                "vehicle_booking_id",
                id,
                agency_id,
                &itineraries,
            )
            .await?;
            sync_children(
                &db,
                session,
                collections::VEHICLE_HOTEL_BOOKINGS,
                "vehicle_booking_id",
                id,
                agency_id,
                &hotels,
            )
            .await
        }
        .boxed()
    })
    .await?;

    Ok(HttpResponse::Ok().json(detail(&db, id, agency_id).await?))
}

pub async fn delete_vehicle_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Delete)?;
    let id = parse_id(&path)?;
    let booking = find_scoped(
        &db.collection::<VehicleBooking>(collections::VEHICLE_BOOKINGS),
        id,
        Some(agency_id),
        "Vehicle booking",
    )
    .await?;

    db.with_transaction(|session| {
        let db = db.get_ref().clone();
        async move {
            for collection in [
                collections::VEHICLE_ITINERARIES,
                collections::VEHICLE_HOTEL_BOOKINGS,
            ] {
                delete_children(&db, session, collection, "vehicle_booking_id", id).await?;
            }
            db.documents(collections::VEHICLE_BOOKINGS)
                .delete_one_with_session(by_id(id, Some(agency_id)), None, session)
                .await?;
            Ok::<_, AppError>(())
        }
        .boxed()
    })
    .await?;

    info!("Vehicle booking {} deleted by {}", booking.hrv_number, auth.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Vehicle booking deleted" })))
}

pub async fn vehicle_voucher(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    let detail = detail(&db, id, agency_id).await?;

    let agency = find_scoped(
        &db.collection::<Agency>(collections::AGENCIES),
        agency_id,
        None,
        "Agency",
    )
    .await?;
    let client = find_scoped(
        &db.collection::<Client>(collections::CLIENTS),
        detail.booking.client_id,
        Some(agency_id),
        "Client",
    )
    .await?;
    let hotel_ids: Vec<ObjectId> = detail.hotels.iter().map(|h| h.hotel_id).collect();
    let hotels: HashMap<ObjectId, Hotel> = find_all(
        &db.collection::<Hotel>(collections::HOTELS),
        doc! { "agency_id": agency_id, "_id": { "$in": hotel_ids } },
        doc! { "name": 1 },
    )
    .await?
    .into_iter()
    .filter_map(|h| h.id.map(|id| (id, h)))
    .collect();

    let layout = documents::vehicle_voucher(&agency, &client, &detail, &hotels);
    pdf_response(&layout, &detail.booking.hrv_number)
}
