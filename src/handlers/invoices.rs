use actix_web::{web, HttpResponse};
use futures::FutureExt;
use log::info;
use mongodb::bson::{oid::ObjectId, Document};
use serde_json::json;

use super::{bookings::load_booking, inserted_id, stamp_new};
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{
    collections,
    numbering::{DocumentKind, NumberGenerator},
    repository::{by_id, date_range, find_page, find_scoped, scoped, with_search},
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    agency::Agency,
    client::Client,
    common::{parse_id, parse_optional_id, ListQuery},
    invoice::{Invoice, InvoiceFilter, InvoiceInput},
};
use crate::pdf::{documents, pdf_response};
use crate::permissions::Action;
use crate::validation::Validate;

const RESOURCE: &str = "invoice";
const SEARCH_FIELDS: &[&str] = &["invoice_number", "notes", "items.description"];
const SORT_FIELDS: &[&str] = &["invoice_number", "invoice_date", "total", "created_at"];

async fn load(db: &MongoDB, id: ObjectId, agency_id: ObjectId) -> Result<Invoice, AppError> {
    find_scoped(
        &db.collection::<Invoice>(collections::INVOICES),
        id,
        Some(agency_id),
        "Invoice",
    )
    .await
}

fn filter_conditions(mut conditions: Document, filter: &InvoiceFilter) -> Result<Document, AppError> {
    if let Some(booking_id) = parse_optional_id(filter.booking_id.as_deref())? {
        conditions.insert("booking_id", booking_id);
    }
    if let Some(client_id) = parse_optional_id(filter.client_id.as_deref())? {
        conditions.insert("client_id", client_id);
    }
    Ok(date_range(conditions, "invoice_date", filter.from, filter.to))
}

pub async fn list_invoices(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    filter: web::Query<InvoiceFilter>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let conditions = with_search(scoped(Some(agency_id)), &query, SEARCH_FIELDS);
    let conditions = filter_conditions(conditions, &filter)?;
    let page = find_page(
        &db.collection::<Invoice>(collections::INVOICES),
        conditions,
        &query,
        SORT_FIELDS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_invoice(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    Ok(HttpResponse::Ok().json(load(&db, id, agency_id).await?))
}

pub async fn create_invoice(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    config: web::Data<Config>,
    body: web::Json<InvoiceInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Create)?;
    let input = body.into_inner();
    input.validate()?;

    let booking_id = input.booking()?;
    let booking = load_booking(&db, booking_id, agency_id).await?;
    let mut fields = input.to_document();
    fields.insert("booking_id", booking_id);
    fields.insert("client_id", booking.client_id);
    stamp_new(&mut fields, agency_id, auth.id);

    let numbers = NumberGenerator::new(config.fiscal_year_start_month);
    let invoice_date = input.invoice_date;
    let id = db
        .with_transaction(|session| {
            let db = db.get_ref().clone();
            let mut fields = fields.clone();
            async move {
                let number = numbers
                    .next(&db, session, Some(agency_id), DocumentKind::Invoice, invoice_date)
                    .await?;
                fields.insert("invoice_number", number);
                inserted_id(
                    db.documents(collections::INVOICES)
                        .insert_one_with_session(fields, None, session)
                        .await?,
                )
            }
            .boxed()
        })
        .await?;

    let created = load(&db, id, agency_id).await?;
    info!(
        "Invoice {} for {} ({:.2}) raised by {}",
        created.invoice_number, booking.booking_number, created.total, auth.id
    );
    Ok(HttpResponse::Created().json(created))
}

pub async fn delete_invoice(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Delete)?;
    let id = parse_id(&path)?;
    let invoice = load(&db, id, agency_id).await?;
    db.documents(collections::INVOICES)
        .delete_one(by_id(id, Some(agency_id)), None)
        .await?;
    info!("Invoice {} deleted by {}", invoice.invoice_number, auth.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Invoice deleted" })))
}

pub async fn invoice_pdf(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    let invoice = load(&db, id, agency_id).await?;

    let agency = find_scoped(
        &db.collection::<Agency>(collections::AGENCIES),
        agency_id,
        None,
        "Agency",
    )
    .await?;
    let client = find_scoped(
        &db.collection::<Client>(collections::CLIENTS),
        invoice.client_id,
        Some(agency_id),
        "Client",
    )
    .await?;
    let booking = load_booking(&db, invoice.booking_id, agency_id).await?;

    let layout = documents::invoice(&agency, &client, &booking.booking_number, &invoice);
    pdf_response(&layout, &invoice.invoice_number)
}
