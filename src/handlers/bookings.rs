use actix_web::{web, HttpResponse};
use futures::FutureExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde_json::json;

use super::{inserted_id, stamp_new, today};
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{
    children::{delete_children, sync_children},
    collections,
    numbering::{DocumentKind, NumberGenerator},
    repository::{
        by_id, date_range, ensure_all_exist, ensure_references, ensure_unreferenced, find_all,
        find_page, find_scoped, scoped, with_search,
    },
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    booking::{
        round2, Booking, BookingDetail, BookingFilter, BookingInput, BookingStatus, StatusUpdate,
        TourBookingDetail,
    },
    common::{parse_id, parse_optional_id, ListQuery},
    receipt::BookingReceipt,
};
use crate::permissions::Action;
use crate::resource::{Dependent, Reference};
use crate::validation::Validate;

const RESOURCE: &str = "booking";
const SEARCH_FIELDS: &[&str] = &["booking_number", "destination"];
const SORT_FIELDS: &[&str] = &[
    "booking_number",
    "enquiry_date",
    "travel_date",
    "total_amount",
    "created_at",
];
const REFERENCES: &[Reference] = &[
    Reference {
        field: "client_id",
        collection: collections::CLIENTS,
        label: "Client",
    },
    Reference {
        field: "branch_id",
        collection: collections::BRANCHES,
        label: "Branch",
    },
    Reference {
        field: "sector_id",
        collection: collections::SECTORS,
        label: "Sector",
    },
    Reference {
        field: "fair_id",
        collection: collections::FAIRS,
        label: "Fair",
    },
    Reference {
        field: "assigned_to",
        collection: collections::USERS,
        label: "Staff member",
    },
];
const DETAIL_SERVICE: Reference = Reference {
    field: "details.service_id",
    collection: collections::SERVICES,
    label: "Service",
};
/// Records that keep a booking alive; follow-ups and detail lines go with it.
const DEPENDENTS: &[Dependent] = &[
    Dependent {
        collection: collections::RECEIPTS,
        field: "booking_id",
        label: "receipts",
    },
    Dependent {
        collection: collections::INVOICES,
        field: "booking_id",
        label: "invoices",
    },
    Dependent {
        collection: collections::HOTEL_BOOKINGS,
        field: "booking_id",
        label: "hotel bookings",
    },
    Dependent {
        collection: collections::JOURNEY_BOOKINGS,
        field: "booking_id",
        label: "journey bookings",
    },
    Dependent {
        collection: collections::VEHICLE_BOOKINGS,
        field: "booking_id",
        label: "vehicle bookings",
    },
];

pub(crate) async fn load_booking(
    db: &MongoDB,
    id: ObjectId,
    agency_id: ObjectId,
) -> Result<Booking, AppError> {
    find_scoped(
        &db.collection::<Booking>(collections::BOOKINGS),
        id,
        Some(agency_id),
        "Booking",
    )
    .await
}

/// Sum of the receipts recorded against a booking.
pub(crate) async fn paid_amount(db: &MongoDB, booking_id: ObjectId) -> Result<f64, AppError> {
    let receipts = find_all(
        &db.collection::<BookingReceipt>(collections::RECEIPTS),
        doc! { "booking_id": booking_id },
        doc! { "receipt_date": 1 },
    )
    .await?;
    Ok(round2(receipts.iter().map(|r| r.amount).sum()))
}

async fn detail(db: &MongoDB, id: ObjectId, agency_id: ObjectId) -> Result<BookingDetail, AppError> {
    let booking = load_booking(db, id, agency_id).await?;
    let details = find_all(
        &db.collection::<TourBookingDetail>(collections::TOUR_BOOKING_DETAILS),
        doc! { "booking_id": id },
        doc! { "date": 1, "created_at": 1 },
    )
    .await?;
    let paid = paid_amount(db, id).await?;
    let balance = round2(booking.total_amount - paid);
    Ok(BookingDetail {
        booking,
        details,
        paid_amount: paid,
        balance,
    })
}

pub async fn list_bookings(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    filter: web::Query<BookingFilter>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let mut conditions = with_search(scoped(Some(agency_id)), &query, SEARCH_FIELDS);
    if let Some(status) = filter.status {
        conditions.insert("status", status.as_str());
    }
    if let Some(client_id) = parse_optional_id(filter.client_id.as_deref())? {
        conditions.insert("client_id", client_id);
    }
    if let Some(branch_id) = parse_optional_id(filter.branch_id.as_deref())? {
        conditions.insert("branch_id", branch_id);
    }
    let conditions = date_range(conditions, "travel_date", filter.from, filter.to);

    let page = find_page(
        &db.collection::<Booking>(collections::BOOKINGS),
        conditions,
        &query,
        SORT_FIELDS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    Ok(HttpResponse::Ok().json(detail(&db, id, agency_id).await?))
}

pub async fn create_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    config: web::Data<Config>,
    body: web::Json<BookingInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Create)?;
    let input = body.into_inner();
    input.validate()?;
    let fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;
    ensure_all_exist(&db, agency_id, input.service_ids()?, &DETAIL_SERVICE).await?;

    let numbers = NumberGenerator::new(config.fiscal_year_start_month);
    let enquiry_date = input.enquiry_date.unwrap_or_else(today);
    let created_by = auth.id;

    let id = db
        .with_transaction(|session| {
            let db = db.get_ref().clone();
            let mut fields = fields.clone();
            let details = input.details.clone();
            async move {
                let number = numbers
                    .next(&db, session, Some(agency_id), DocumentKind::Booking, enquiry_date)
                    .await?;
                fields.insert("booking_number", number);
                fields.insert("enquiry_date", enquiry_date.to_string());
                fields.insert("status", BookingStatus::Enquiry.as_str());
                stamp_new(&mut fields, agency_id, created_by);
                let id = inserted_id(
                    db.documents(collections::BOOKINGS)
                        .insert_one_with_session(fields, None, session)
                        .await?,
                )?;
                sync_children(
                    &db,
                    session,
                    collections::TOUR_BOOKING_DETAILS,
                    "booking_id",
                    id,
                    agency_id,
                    &details,
                )
                .await?;
                Ok::<_, AppError>(id)
            }
            .boxed()
        })
        .await?;

    let created = detail(&db, id, agency_id).await?;
    info!(
        "Booking {} created by {}",
        created.booking.booking_number, auth.id
    );
    Ok(HttpResponse::Created().json(created))
}

pub async fn update_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<BookingInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Update)?;
    let id = parse_id(&path)?;
    let input = body.into_inner();
    input.validate()?;
    let fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;
    ensure_all_exist(&db, agency_id, input.service_ids()?, &DETAIL_SERVICE).await?;

    db.with_transaction(|session| {
        let db = db.get_ref().clone();
        let mut fields = fields.clone();
        let details = input.details.clone();
        async move {
            fields.insert("updated_at", DateTime::now());
            let result = db
                .documents(collections::BOOKINGS)
                .update_one_with_session(
                    by_id(id, Some(agency_id)),
                    doc! { "$set": fields },
                    None,
                    session,
                )
                .await?;
            if result.matched_count == 0 {
                return Err(AppError::not_found("Booking"));
            }
            sync_children(
                &db,
                session,
                collections::TOUR_BOOKING_DETAILS,
                "booking_id",
                id,
                agency_id,
                &details,
            )
            .await
        }
        .boxed()
    })
    .await?;

    Ok(HttpResponse::Ok().json(detail(&db, id, agency_id).await?))
}

pub async fn update_status(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<StatusUpdate>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Update)?;
    let id = parse_id(&path)?;
    let next = body.status;

    let booking = load_booking(&db, id, agency_id).await?;
    if !booking.status.can_become(next) {
        return Err(AppError::Conflict(format!(
            "Booking {} is {} and cannot become {}",
            booking.booking_number,
            booking.status.as_str(),
            next.as_str()
        )));
    }
    // Matched on the old status: a concurrent move leaves nothing to update.
    let result = db
        .documents(collections::BOOKINGS)
        .update_one(
            doc! { "_id": id, "agency_id": agency_id, "status": booking.status.as_str() },
            doc! { "$set": { "status": next.as_str(), "updated_at": DateTime::now() } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::Conflict(format!(
            "Booking {} was changed by someone else; reload and retry",
            booking.booking_number
        )));
    }
    info!(
        "Booking {} moved from {} to {} by {}",
        booking.booking_number,
        booking.status.as_str(),
        next.as_str(),
        auth.id
    );
    Ok(HttpResponse::Ok().json(detail(&db, id, agency_id).await?))
}

pub async fn delete_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Delete)?;
    let id = parse_id(&path)?;
    let booking = load_booking(&db, id, agency_id).await?;
    ensure_unreferenced(&db, id, "Booking", DEPENDENTS).await?;

    db.with_transaction(|session| {
        let db = db.get_ref().clone();
        async move {
            delete_children(&db, session, collections::TOUR_BOOKING_DETAILS, "booking_id", id)
                .await?;
            delete_children(&db, session, collections::FOLLOW_UPS, "booking_id", id).await?;
            db.documents(collections::BOOKINGS)
                .delete_one_with_session(by_id(id, Some(agency_id)), None, session)
                .await?;
            Ok::<_, AppError>(())
        }
        .boxed()
    })
    .await?;

    info!("Booking {} deleted by {}", booking.booking_number, auth.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Booking deleted" })))
}

