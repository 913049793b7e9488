pub mod agency;
pub mod auth;
pub mod bookings;
pub mod clients;
pub mod follow_ups;
pub mod group_bookings;
pub mod hotel_bookings;
pub mod invoices;
pub mod journey_bookings;
pub mod receipts;
pub mod resources;
pub mod staff;
pub mod subscriptions;
pub mod vehicle_bookings;

use mongodb::{
    bson::{oid::ObjectId, Bson, DateTime, Document},
    results::InsertOneResult,
};

use crate::error::AppError;

/// Adds ownership and audit fields to a document about to be inserted.
pub(crate) fn stamp_new(doc: &mut Document, agency_id: ObjectId, created_by: ObjectId) {
    let now = DateTime::now();
    doc.insert("agency_id", agency_id);
    doc.insert("created_by", created_by);
    doc.insert("created_at", now);
    doc.insert("updated_at", now);
}

pub(crate) fn inserted_id(result: InsertOneResult) -> Result<ObjectId, AppError> {
    match result.inserted_id {
        Bson::ObjectId(id) => Ok(id),
        other => Err(AppError::Internal(format!("unexpected inserted id {other}"))),
    }
}

/// Today in the server's local calendar.
pub(crate) fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}
