//! Generic CRUD handlers for every [`Resource`].

use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use log::info;
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use serde_json::json;

use super::{inserted_id, subscriptions::ensure_capacity};
use crate::auth::AuthUser;
use crate::db::{
    repository::{
        by_id, ensure_references, ensure_unique, ensure_unreferenced, find_page, find_scoped,
        id_filters, scoped, with_search,
    },
    MongoDB,
};
use crate::error::AppError;
use crate::models::common::{parse_id, ListQuery};
use crate::permissions::Action;
use crate::resource::{Resource, Scope};
use crate::validation::Validate;

/// Agency filter for reading `T`. Platform data is readable by anyone signed in.
fn read_scope<T: Resource>(auth: &AuthUser) -> Result<Option<ObjectId>, AppError> {
    match T::SCOPE {
        Scope::Agency => auth.require(T::PERMISSION, Action::View).map(Some),
        Scope::Platform => Ok(None),
    }
}

fn write_scope<T: Resource>(auth: &AuthUser, action: Action) -> Result<Option<ObjectId>, AppError> {
    match T::SCOPE {
        Scope::Agency => auth.require(T::PERMISSION, action).map(Some),
        Scope::Platform => auth.require_platform_admin().map(|()| None),
    }
}

async fn check_unique<T: Resource>(
    db: &MongoDB,
    agency: Option<ObjectId>,
    fields: &Document,
    exclude: Option<ObjectId>,
) -> Result<(), AppError> {
    let Ok(value) = fields.get_str(T::UNIQUE_FIELD) else {
        return Ok(());
    };
    let mut within = scoped(agency);
    for field in T::UNIQUE_WITHIN {
        within.insert(*field, fields.get(*field).cloned().unwrap_or(Bson::Null));
    }
    ensure_unique(
        &db.documents(T::COLLECTION),
        within,
        T::UNIQUE_FIELD,
        value,
        exclude,
        T::LABEL,
    )
    .await
}

pub async fn list<T: Resource>(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    params: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let agency = read_scope::<T>(&auth)?;
    let filter = with_search(scoped(agency), &query, T::SEARCH_FIELDS);
    let filter = id_filters(filter, params.iter(), T::FILTERS)?;
    let page = find_page(
        &db.collection::<T>(T::COLLECTION),
        filter,
        &query,
        T::SORT_FIELDS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get<T: Resource>(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency = read_scope::<T>(&auth)?;
    let id = parse_id(&path)?;
    let item = find_scoped(&db.collection::<T>(T::COLLECTION), id, agency, T::LABEL).await?;
    Ok(HttpResponse::Ok().json(item))
}

pub async fn create<T: Resource>(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    body: web::Json<T::Input>,
) -> Result<HttpResponse, AppError> {
    let agency = write_scope::<T>(&auth, Action::Create)?;
    let input = body.into_inner();
    input.validate()?;

    let mut fields = T::to_document(&input)?;
    check_unique::<T>(&db, agency, &fields, None).await?;
    ensure_references(&db, agency, &fields, T::REFERENCES).await?;
    if let (Some(agency_id), Some(limit)) = (agency, T::QUOTA) {
        ensure_capacity(&db, agency_id, T::COLLECTION, limit, T::LABEL).await?;
    }

    let now = DateTime::now();
    if let Some(agency_id) = agency {
        fields.insert("agency_id", agency_id);
    }
    fields.insert("created_at", now);
    fields.insert("updated_at", now);

    let result = db
        .documents(T::COLLECTION)
        .insert_one(fields, None)
        .await?;
    let id = inserted_id(result)?;
    info!("{} {} created by {}", T::LABEL, id, auth.id);

    let item = find_scoped(&db.collection::<T>(T::COLLECTION), id, agency, T::LABEL).await?;
    Ok(HttpResponse::Created().json(item))
}

pub async fn update<T: Resource>(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<T::Input>,
) -> Result<HttpResponse, AppError> {
    let agency = write_scope::<T>(&auth, Action::Update)?;
    let id = parse_id(&path)?;
    let input = body.into_inner();
    input.validate()?;

    let mut fields = T::to_document(&input)?;
    check_unique::<T>(&db, agency, &fields, Some(id)).await?;
    ensure_references(&db, agency, &fields, T::REFERENCES).await?;
    fields.insert("updated_at", DateTime::now());

    let result = db
        .documents(T::COLLECTION)
        .update_one(by_id(id, agency), doc! { "$set": fields }, None)
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found(T::LABEL));
    }

    let item = find_scoped(&db.collection::<T>(T::COLLECTION), id, agency, T::LABEL).await?;
    Ok(HttpResponse::Ok().json(item))
}

pub async fn delete<T: Resource>(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency = write_scope::<T>(&auth, Action::Delete)?;
    let id = parse_id(&path)?;

    let collection = db.documents(T::COLLECTION);
    if collection.count_documents(by_id(id, agency), None).await? == 0 {
        return Err(AppError::not_found(T::LABEL));
    }
    ensure_unreferenced(&db, id, T::LABEL, T::DEPENDENTS).await?;

    collection.delete_one(by_id(id, agency), None).await?;
    info!("{} {} deleted by {}", T::LABEL, id, auth.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": format!("{} deleted", T::LABEL) })))
}

/// Routes list/create on `path` and get/update/delete on `path/{id}`.
pub fn scope<T: Resource>(path: &str) -> actix_web::Scope {
    web::scope(path)
        .route("", web::get().to(list::<T>))
        .route("", web::post().to(create::<T>))
        .route("/{id}", web::get().to(get::<T>))
        .route("/{id}", web::put().to(update::<T>))
        .route("/{id}", web::delete().to(delete::<T>))
}
