use actix_web::{web, HttpResponse};
use futures::FutureExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde_json::json;

use super::{
    bookings::{load_booking, paid_amount},
    inserted_id, stamp_new,
};
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{
    collections,
    numbering::{DocumentKind, NumberGenerator},
    repository::{by_id, date_range, ensure_references, find_page, find_scoped, scoped, with_search},
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    agency::Agency,
    booking::BookingStatus,
    client::Client,
    common::{parse_id, parse_optional_id, ListQuery},
    receipt::{BookingReceipt, ReceiptFilter, ReceiptInput},
    reference::Bank,
};
use crate::pdf::{documents, pdf_response};
use crate::permissions::Action;
use crate::resource::Reference;
use crate::validation::Validate;

const RESOURCE: &str = "receipt";
const SEARCH_FIELDS: &[&str] = &["receipt_number", "reference", "remarks"];
const SORT_FIELDS: &[&str] = &["receipt_number", "receipt_date", "amount", "created_at"];
const REFERENCES: &[Reference] = &[Reference {
    field: "bank_id",
    collection: collections::BANKS,
    label: "Bank",
}];

async fn load(db: &MongoDB, id: ObjectId, agency_id: ObjectId) -> Result<BookingReceipt, AppError> {
    find_scoped(
        &db.collection::<BookingReceipt>(collections::RECEIPTS),
        id,
        Some(agency_id),
        "Receipt",
    )
    .await
}

fn filter_conditions(mut conditions: Document, filter: &ReceiptFilter) -> Result<Document, AppError> {
    if let Some(booking_id) = parse_optional_id(filter.booking_id.as_deref())? {
        conditions.insert("booking_id", booking_id);
    }
    if let Some(client_id) = parse_optional_id(filter.client_id.as_deref())? {
        conditions.insert("client_id", client_id);
    }
    if let Some(mode) = filter.payment_mode {
        conditions.insert("payment_mode", mode.as_str());
    }
    Ok(date_range(conditions, "receipt_date", filter.from, filter.to))
}

pub async fn list_receipts(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    filter: web::Query<ReceiptFilter>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let conditions = with_search(scoped(Some(agency_id)), &query, SEARCH_FIELDS);
    let conditions = filter_conditions(conditions, &filter)?;
    let page = find_page(
        &db.collection::<BookingReceipt>(collections::RECEIPTS),
        conditions,
        &query,
        SORT_FIELDS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_receipt(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    Ok(HttpResponse::Ok().json(load(&db, id, agency_id).await?))
}

pub async fn create_receipt(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    config: web::Data<Config>,
    body: web::Json<ReceiptInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Create)?;
    let input = body.into_inner();
    input.validate()?;

    let booking = load_booking(&db, input.booking()?, agency_id).await?;
    if booking.status == BookingStatus::Cancelled {
        return Err(AppError::Conflict(format!(
            "Booking {} is cancelled and cannot take payments",
            booking.booking_number
        )));
    }
    let mut fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;
    fields.insert("booking_id", input.booking()?);
    fields.insert("client_id", booking.client_id);
    stamp_new(&mut fields, agency_id, auth.id);

    let numbers = NumberGenerator::new(config.fiscal_year_start_month);
    let receipt_date = input.receipt_date;
    let id = db
        .with_transaction(|session| {
            let db = db.get_ref().clone();
            let mut fields = fields.clone();
            async move {
                let number = numbers
                    .next(&db, session, Some(agency_id), DocumentKind::Receipt, receipt_date)
                    .await?;
                fields.insert("receipt_number", number);
                inserted_id(
                    db.documents(collections::RECEIPTS)
                        .insert_one_with_session(fields, None, session)
                        .await?,
                )
            }
            .boxed()
        })
        .await?;

    let created = load(&db, id, agency_id).await?;
    info!(
        "Receipt {} of {:.2} against {} recorded by {}",
        created.receipt_number, created.amount, booking.booking_number, auth.id
    );
    Ok(HttpResponse::Created().json(created))
}

/// Only the payment fields change; the receipt stays on its booking.
pub async fn update_receipt(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<ReceiptInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Update)?;
    let id = parse_id(&path)?;
    let input = body.into_inner();
    input.validate()?;

    let current = load(&db, id, agency_id).await?;
    if input.booking()? != current.booking_id {
        return Err(AppError::BadRequest(
            "A receipt cannot be moved to another booking".into(),
        ));
    }
    let mut fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;
    fields.insert("updated_at", DateTime::now());

    db.documents(collections::RECEIPTS)
        .update_one(by_id(id, Some(agency_id)), doc! { "$set": fields }, None)
        .await?;
    Ok(HttpResponse::Ok().json(load(&db, id, agency_id).await?))
}

pub async fn delete_receipt(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Delete)?;
    let id = parse_id(&path)?;
    let receipt = load(&db, id, agency_id).await?;
    db.documents(collections::RECEIPTS)
        .delete_one(by_id(id, Some(agency_id)), None)
        .await?;
    info!("Receipt {} deleted by {}", receipt.receipt_number, auth.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Receipt deleted" })))
}

pub async fn receipt_pdf(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    let receipt = load(&db, id, agency_id).await?;

    let agency = find_scoped(
        &db.collection::<Agency>(collections::AGENCIES),
        agency_id,
        None,
        "Agency",
    )
    .await?;
    let booking = load_booking(&db, receipt.booking_id, agency_id).await?;
    let client = find_scoped(
        &db.collection::<Client>(collections::CLIENTS),
        receipt.client_id,
        Some(agency_id),
        "Client",
    )
    .await?;
    let bank = match receipt.bank_id {
        Some(bank_id) => {
            db.collection::<Bank>(collections::BANKS)
                .find_one(by_id(bank_id, Some(agency_id)), None)
                .await?
        }
        None => None,
    };
    let paid = paid_amount(&db, receipt.booking_id).await?;

    let context = documents::ReceiptContext {
        agency: &agency,
        client: &client,
        booking_number: &booking.booking_number,
        bank: bank.as_ref(),
        booking_total: booking.total_amount,
        paid,
    };
    let layout = documents::receipt(&context, &receipt);
    pdf_response(&layout, &receipt.receipt_number)
}
