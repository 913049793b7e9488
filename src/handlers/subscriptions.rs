use actix_web::{web, HttpResponse};
use chrono::NaiveDate;
use futures::FutureExt;
use log::info;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime},
    options::FindOneOptions,
    ClientSession,
};

use super::{inserted_id, today};
use crate::auth::AuthUser;
use crate::config::Config;
use crate::db::{
    collections,
    numbering::{DocumentKind, NumberGenerator},
    repository::{find_page, find_scoped, scoped},
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    agency::Agency,
    common::{parse_id, parse_optional_id, ListQuery},
    reference::Package,
    subscription::{
        compute_period, status_conditions, SubscribeRequest, Subscription, SubscriptionFilter,
        SubscriptionStatus,
    },
};
use crate::pdf::{documents, pdf_response};
use crate::permissions::Action;
use crate::validation::Validate;

const RESOURCE: &str = "subscription";
const SORT_FIELDS: &[&str] = &["start_date", "end_date", "amount", "created_at"];

/// The active subscription covering `day`, if any.
pub async fn active_subscription(
    db: &MongoDB,
    agency_id: ObjectId,
    day: NaiveDate,
) -> Result<Option<Subscription>, AppError> {
    let options = FindOneOptions::builder()
        .sort(doc! { "end_date": -1 })
        .build();
    let found = db
        .collection::<Subscription>(collections::SUBSCRIPTIONS)
        .find_one(
            doc! {
                "agency_id": agency_id,
                "status": SubscriptionStatus::Active.as_str(),
                "start_date": { "$lte": day.to_string() },
                "end_date": { "$gte": day.to_string() },
            },
            options,
        )
        .await?;
    Ok(found)
}

/// Refuses a new row in `collection` once the agency holds as many as its
/// package allows. Agencies without an active subscription are not capped.
pub async fn ensure_capacity(
    db: &MongoDB,
    agency_id: ObjectId,
    collection: &str,
    limit_field: &str,
    label: &str,
) -> Result<(), AppError> {
    let Some(subscription) = active_subscription(db, agency_id, today()).await? else {
        return Ok(());
    };
    let Some(limit) = subscription.limit(limit_field) else {
        return Ok(());
    };
    let used = db
        .documents(collection)
        .count_documents(doc! { "agency_id": agency_id }, None)
        .await?;
    if used as i64 >= limit {
        return Err(AppError::Forbidden(format!(
            "The {} package allows {limit} {}; upgrade to add more",
            subscription.package_name,
            label.to_lowercase()
        )));
    }
    Ok(())
}

/// End of the latest active period that has not lapsed yet.
async fn current_end(
    db: &MongoDB,
    session: &mut ClientSession,
    agency_id: ObjectId,
    day: NaiveDate,
) -> Result<Option<NaiveDate>, AppError> {
    let options = FindOneOptions::builder()
        .sort(doc! { "end_date": -1 })
        .build();
    let latest = db
        .collection::<Subscription>(collections::SUBSCRIPTIONS)
        .find_one_with_session(
            doc! {
                "agency_id": agency_id,
                "status": SubscriptionStatus::Active.as_str(),
                "end_date": { "$gte": day.to_string() },
            },
            options,
            session,
        )
        .await?;
    Ok(latest.map(|s| s.end_date))
}

pub async fn list_subscriptions(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    filter: web::Query<SubscriptionFilter>,
) -> Result<HttpResponse, AppError> {
    let agency = if auth.platform_admin {
        parse_optional_id(filter.agency_id.as_deref())?
    } else {
        Some(auth.require(RESOURCE, Action::View)?)
    };
    let day = today();
    let mut conditions = scoped(agency);
    if let Some(status) = filter.status {
        conditions.extend(status_conditions(status, day));
    }
    let page = find_page(
        &db.collection::<Subscription>(collections::SUBSCRIPTIONS),
        conditions,
        &query,
        SORT_FIELDS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page.map(|s| s.as_of(day))))
}

pub async fn subscribe(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    config: web::Data<Config>,
    body: web::Json<SubscribeRequest>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Create)?;
    let input = body.into_inner();
    input.validate()?;

    let package_id = parse_id(&input.package_id)?;
    let package = find_scoped(
        &db.collection::<Package>(collections::PACKAGES),
        package_id,
        None,
        "Package",
    )
    .await?;
    if !package.active {
        return Err(AppError::BadRequest(format!(
            "Package {} is no longer offered",
            package.name
        )));
    }

    let numbers = NumberGenerator::new(config.fiscal_year_start_month);
    let day = today();
    let id = db
        .with_transaction(|session| {
            let db = db.get_ref().clone();
            let package = package.clone();
            let reference = input.payment_reference.clone();
            async move {
                let end = current_end(&db, session, agency_id, day).await?;
                let (start_date, end_date) = compute_period(day, end, package.duration_days)?;
                let invoice_number = numbers
                    .next(&db, session, None, DocumentKind::SubscriptionInvoice, day)
                    .await?;
                let now = DateTime::now();
                let result = db
                    .documents(collections::SUBSCRIPTIONS)
                    .insert_one_with_session(
                        doc! {
                            "agency_id": agency_id,
                            "package_id": package_id,
                            "package_name": package.name.clone(),
                            "invoice_number": invoice_number,
                            "start_date": start_date.to_string(),
                            "end_date": end_date.to_string(),
                            "amount": package.price,
                            "max_users": package.max_users,
                            "max_branches": package.max_branches,
                            "status": SubscriptionStatus::Active.as_str(),
                            "payment_reference": reference,
                            "created_at": now,
                            "updated_at": now,
                        },
                        None,
                        session,
                    )
                    .await?;
                inserted_id(result)
            }
            .boxed()
        })
        .await?;

    let subscription = find_scoped(
        &db.collection::<Subscription>(collections::SUBSCRIPTIONS),
        id,
        Some(agency_id),
        "Subscription",
    )
    .await?;
    info!(
        "Agency {} subscribed to {} ({})",
        agency_id, subscription.package_name, subscription.invoice_number
    );
    Ok(HttpResponse::Created().json(subscription))
}

pub async fn current_subscription(
    auth: AuthUser,
    db: web::Data<MongoDB>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let day = today();
    let subscription = active_subscription(&db, agency_id, day)
        .await?
        .ok_or_else(|| AppError::not_found("Active subscription"))?;
    Ok(HttpResponse::Ok().json(subscription.as_of(day)))
}

/// Platform admins act on any agency's subscription; agencies on their own.
fn owner_scope(auth: &AuthUser, action: Action) -> Result<Option<ObjectId>, AppError> {
    if auth.platform_admin {
        Ok(None)
    } else {
        auth.require(RESOURCE, action).map(Some)
    }
}

pub async fn cancel_subscription(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency = owner_scope(&auth, Action::Update)?;
    let id = parse_id(&path)?;
    let collection = db.collection::<Subscription>(collections::SUBSCRIPTIONS);
    let subscription = find_scoped(&collection, id, agency, "Subscription").await?;

    if subscription.status_on(today()) != SubscriptionStatus::Active {
        return Err(AppError::Conflict(format!(
            "Subscription {} is not active",
            subscription.invoice_number
        )));
    }
    db.documents(collections::SUBSCRIPTIONS)
        .update_one(
            doc! { "_id": id },
            doc! { "$set": {
                "status": SubscriptionStatus::Cancelled.as_str(),
                "updated_at": DateTime::now(),
            } },
            None,
        )
        .await?;
    info!("Subscription {} cancelled by {}", subscription.invoice_number, auth.id);

    let updated = find_scoped(&collection, id, agency, "Subscription").await?;
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn subscription_invoice(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency = owner_scope(&auth, Action::View)?;
    let id = parse_id(&path)?;
    let subscription = find_scoped(
        &db.collection::<Subscription>(collections::SUBSCRIPTIONS),
        id,
        agency,
        "Subscription",
    )
    .await?;
    let owner = find_scoped(
        &db.collection::<Agency>(collections::AGENCIES),
        subscription.agency_id,
        None,
        "Agency",
    )
    .await?;
    let layout = documents::subscription_invoice(&owner, &subscription);
    pdf_response(&layout, &subscription.invoice_number)
}
