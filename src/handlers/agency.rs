use actix_web::{web, HttpResponse};
use log::info;
use mongodb::bson::{doc, DateTime};

use crate::auth::AuthUser;
use crate::db::{
    collections,
    repository::{find_page, find_scoped, with_search},
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    agency::{Agency, AgencyStatus, AgencyUpdate},
    common::{parse_id, ListQuery},
};
use crate::permissions::Action;
use crate::validation::Validate;

const RESOURCE: &str = "agency";

async fn load(db: &MongoDB, id: mongodb::bson::oid::ObjectId) -> Result<Agency, AppError> {
    find_scoped(
        &db.collection::<Agency>(collections::AGENCIES),
        id,
        None,
        "Agency",
    )
    .await
}

pub async fn get_profile(auth: AuthUser, db: web::Data<MongoDB>) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    Ok(HttpResponse::Ok().json(load(&db, agency_id).await?))
}

pub async fn update_profile(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    body: web::Json<AgencyUpdate>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Update)?;
    let update = body.into_inner();
    update.validate()?;

    let mut fields = update.to_document();
    fields.insert("updated_at", DateTime::now());
    db.documents(collections::AGENCIES)
        .update_one(doc! { "_id": agency_id }, doc! { "$set": fields }, None)
        .await?;
    Ok(HttpResponse::Ok().json(load(&db, agency_id).await?))
}

#[derive(serde::Deserialize, Debug, Default)]
pub struct AgencyFilter {
    pub active: Option<bool>,
}

pub async fn list_agencies(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    filter: web::Query<AgencyFilter>,
) -> Result<HttpResponse, AppError> {
    auth.require_platform_admin()?;
    let mut conditions = with_search(doc! {}, &query, &["name", "email", "phone"]);
    if let Some(active) = filter.active {
        conditions.insert("active", active);
    }
    let page = find_page(
        &db.collection::<Agency>(collections::AGENCIES),
        conditions,
        &query,
        &["name", "email", "created_at"],
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn set_status(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<AgencyStatus>,
) -> Result<HttpResponse, AppError> {
    auth.require_platform_admin()?;
    let id = parse_id(&path)?;
    let result = db
        .documents(collections::AGENCIES)
        .update_one(
            doc! { "_id": id },
            doc! { "$set": { "active": body.active, "updated_at": DateTime::now() } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found("Agency"));
    }
    info!(
        "Agency {id} {} by {}",
        if body.active { "activated" } else { "suspended" },
        auth.id
    );
    Ok(HttpResponse::Ok().json(load(&db, id).await?))
}
