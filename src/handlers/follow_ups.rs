use actix_web::{web, HttpResponse};
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde_json::json;

use super::{bookings::load_booking, inserted_id, stamp_new, today};
use crate::auth::AuthUser;
use crate::db::{
    collections,
    repository::{by_id, find_all, find_scoped},
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    booking::{DueQuery, FollowUp, FollowUpInput, FollowUpStatus},
    common::parse_id,
};
use crate::permissions::Action;
use crate::validation::Validate;

const RESOURCE: &str = "follow_up";

async fn load(db: &MongoDB, id: ObjectId, agency_id: ObjectId) -> Result<FollowUp, AppError> {
    find_scoped(
        &db.collection::<FollowUp>(collections::FOLLOW_UPS),
        id,
        Some(agency_id),
        "Follow-up",
    )
    .await
}

pub async fn list_for_booking(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let booking_id = parse_id(&path)?;
    load_booking(&db, booking_id, agency_id).await?;

    let follow_ups = find_all(
        &db.collection::<FollowUp>(collections::FOLLOW_UPS),
        doc! { "agency_id": agency_id, "booking_id": booking_id },
        doc! { "follow_up_date": -1, "created_at": -1 },
    )
    .await?;
    Ok(HttpResponse::Ok().json(follow_ups))
}

pub async fn create_follow_up(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<FollowUpInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Create)?;
    let booking_id = parse_id(&path)?;
    body.validate()?;
    let booking = load_booking(&db, booking_id, agency_id).await?;

    let mut fields = body.to_document();
    fields.insert("booking_id", booking_id);
    stamp_new(&mut fields, agency_id, auth.id);
    let id = inserted_id(
        db.documents(collections::FOLLOW_UPS)
            .insert_one(fields, None)
            .await?,
    )?;
    info!("Follow-up added to {} by {}", booking.booking_number, auth.id);
    Ok(HttpResponse::Created().json(load(&db, id, agency_id).await?))
}

pub async fn update_follow_up(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<FollowUpInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Update)?;
    let id = parse_id(&path)?;
    body.validate()?;

    let mut fields = body.to_document();
    fields.insert("updated_at", DateTime::now());
    let result = db
        .documents(collections::FOLLOW_UPS)
        .update_one(by_id(id, Some(agency_id)), doc! { "$set": fields }, None)
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found("Follow-up"));
    }
    Ok(HttpResponse::Ok().json(load(&db, id, agency_id).await?))
}

pub async fn delete_follow_up(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Delete)?;
    let id = parse_id(&path)?;
    let result = db
        .documents(collections::FOLLOW_UPS)
        .delete_one(by_id(id, Some(agency_id)), None)
        .await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("Follow-up"));
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Follow-up deleted" })))
}

/// Pending follow-ups whose next contact (or, failing that, the follow-up
/// itself) falls on or before `date`, defaulting to today.
pub async fn due_follow_ups(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<DueQuery>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let day = query.date.unwrap_or_else(today).to_string();

    let follow_ups = find_all(
        &db.collection::<FollowUp>(collections::FOLLOW_UPS),
        doc! {
            "agency_id": agency_id,
            "status": FollowUpStatus::Pending.as_str(),
            "$or": [
                { "next_follow_up": { "$lte": day.as_str() } },
                { "next_follow_up": null, "follow_up_date": { "$lte": day.as_str() } },
            ],
        },
        doc! { "next_follow_up": 1, "follow_up_date": 1 },
    )
    .await?;
    Ok(HttpResponse::Ok().json(follow_ups))
}
