use std::collections::HashMap;

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
        by_id, date_range, ensure_all_exist, ensure_references, find_all, find_page,
        find_scoped, id_filters, scoped, with_search,
    },
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    booking::BookingStatus,
    common::{parse_id, DateRange, ListQuery},
    group_booking::{GroupBooking, GroupBookingDetail, GroupBookingInput, GroupClientBooking},
};
use crate::permissions::Action;
use crate::resource::Reference;
use crate::validation::Validate;

const RESOURCE: &str = "group_booking";
const SEARCH_FIELDS: &[&str] = &["booking_number", "group_name", "destination"];
const SORT_FIELDS: &[&str] = &["booking_number", "travel_date", "total_amount", "created_at"];
const REFERENCES: &[Reference] = &[
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
];

async fn detail(
    db: &MongoDB,
    id: ObjectId,
    agency_id: ObjectId,
) -> Result<GroupBookingDetail, AppError> {
    let booking = find_scoped(
        &db.collection::<GroupBooking>(collections::GROUP_BOOKINGS),
        id,
        Some(agency_id),
        "Group booking",
    )
    .await?;
    let clients = find_all(
        &db.collection::<GroupClientBooking>(collections::GROUP_CLIENT_BOOKINGS),
        doc! { "group_booking_id": id },
        doc! { "created_at": 1 },
    )
    .await?;
    Ok(GroupBookingDetail { booking, clients })
}

const MEMBER: Reference = Reference {
    field: "clients",
    collection: collections::CLIENTS,
    label: "Client",
};

pub async fn list_group_bookings(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    range: web::Query<DateRange>,
    params: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let mut filter = with_search(scoped(Some(agency_id)), &query, SEARCH_FIELDS);
    if let Some(status) = params.get("status").filter(|s| !s.is_empty()) {
        filter.insert("status", status.as_str());
    }
    let filter = id_filters(filter, params.iter(), &["branch_id", "sector_id"])?;
    let filter = date_range(filter, "travel_date", range.from, range.to);

    let page = find_page(
        &db.collection::<GroupBooking>(collections::GROUP_BOOKINGS),
        filter,
        &query,
        SORT_FIELDS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_group_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    Ok(HttpResponse::Ok().json(detail(&db, id, agency_id).await?))
}

pub async fn create_group_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    config: web::Data<Config>,
    body: web::Json<GroupBookingInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Create)?;
    let input = body.into_inner();
    input.validate()?;
    let fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;
    ensure_all_exist(&db, agency_id, input.client_ids()?, &MEMBER).await?;

    let numbers = NumberGenerator::new(config.fiscal_year_start_month);
    let day = today();
    let created_by = auth.id;

    let id = db
        .with_transaction(|session| {
            let db = db.get_ref().clone();
            let mut fields = fields.clone();
            let clients = input.clients.clone();
            async move {
                let number = numbers
                    .next(&db, session, Some(agency_id), DocumentKind::GroupBooking, day)
                    .await?;
                fields.insert("booking_number", number);
                fields.insert("status", BookingStatus::Enquiry.as_str());
                stamp_new(&mut fields, agency_id, created_by);
                let id = inserted_id(
                    db.documents(collections::GROUP_BOOKINGS)
                        .insert_one_with_session(fields, None, session)
                        .await?,
                )?;
                sync_children(
                    &db,
                    session,
                    collections::GROUP_CLIENT_BOOKINGS,
                    "group_booking_id",
                    id,
                    agency_id,
                    &clients,
                )
                .await?;
                Ok::<_, AppError>(id)
            }
            .boxed()
        })
        .await?;

    let created = detail(&db, id, agency_id).await?;
    info!(
        "Group booking {} ({} clients) created by {}",
        created.booking.booking_number,
        created.clients.len(),
        auth.id
    );
    Ok(HttpResponse::Created().json(created))
}

pub async fn update_group_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<GroupBookingInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Update)?;
    let id = parse_id(&path)?;
    let input = body.into_inner();
    input.validate()?;
    let fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;
    ensure_all_exist(&db, agency_id, input.client_ids()?, &MEMBER).await?;

    let current = find_scoped(
        &db.collection::<GroupBooking>(collections::GROUP_BOOKINGS),
        id,
        Some(agency_id),
        "Group booking",
    )
    .await?;
    if !current.status.can_become(input.status) {
        return Err(AppError::Conflict(format!(
            "Group booking {} is {} and cannot become {}",
            current.booking_number,
            current.status.as_str(),
            input.status.as_str()
        )));
    }

    // Matched on the status checked above so a concurrent move is not overwritten.
    let guard = doc! { "_id": id, "agency_id": agency_id, "status": current.status.as_str() };
    db.with_transaction(|session| {
        let db = db.get_ref().clone();
        let mut fields = fields.clone();
        let clients = input.clients.clone();
        let guard = guard.clone();
        let number = current.booking_number.clone();
        async move {
            fields.insert("updated_at", DateTime::now());
            let result = db
                .documents(collections::GROUP_BOOKINGS)
                .update_one_with_session(guard, doc! { "$set": fields }, None, session)
                .await?;
            if result.matched_count == 0 {
                return Err(AppError::Conflict(format!(
                    "Group booking {number} was changed by someone else; reload and retry"
                )));
            }
            sync_children(
                &db,
                session,
                collections::GROUP_CLIENT_BOOKINGS,
                "group_booking_id",
                id,
                agency_id,
                &clients,
            )
            .await
        }
        .boxed()
    })
    .await?;

    Ok(HttpResponse::Ok().json(detail(&db, id, agency_id).await?))
}

pub async fn delete_group_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Delete)?;
    let id = parse_id(&path)?;
    let booking = find_scoped(
        &db.collection::<GroupBooking>(collections::GROUP_BOOKINGS),
        id,
        Some(agency_id),
        "Group booking",
    )
    .await?;

    db.with_transaction(|session| {
        let db = db.get_ref().clone();
        async move {
            delete_children(
                &db,
                session,
                collections::GROUP_CLIENT_BOOKINGS,
                "group_booking_id",
                id,
            )
            .await?;
            db.documents(collections::GROUP_BOOKINGS)
                .delete_one_with_session(by_id(id, Some(agency_id)), None, session)
                .await?;
            Ok::<_, AppError>(())
        }
        .boxed()
    })
    .await?;

    info!("Group booking {} deleted by {}", booking.booking_number, auth.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Group booking deleted" })))
}
