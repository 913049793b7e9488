use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde_json::json;

use super::{inserted_id, subscriptions::ensure_capacity};
use crate::auth::AuthUser;
use crate::db::{
    collections,
    repository::{
        by_id, ensure_references, ensure_unique, find_page, find_scoped, id_filters, scoped,
        with_search,
    },
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    common::{parse_id, ListQuery},
    user::{CreateStaff, PasswordChange, StaffInput},
    User,
};
use crate::permissions::Action;
use crate::resource::Reference;
use crate::validation::Validate;

const RESOURCE: &str = "staff";
const SEARCH_FIELDS: &[&str] = &["name", "email", "phone"];
const SORT_FIELDS: &[&str] = &["name", "email", "created_at"];
const REFERENCES: &[Reference] = &[
    Reference {
        field: "role_id",
        collection: collections::ROLES,
        label: "Role",
    },
    Reference {
        field: "branch_id",
        collection: collections::BRANCHES,
        label: "Branch",
    },
];

/// Checks the e-mail is free and the role and branch exist in the agency.
async fn check_staff(
    db: &MongoDB,
    agency_id: ObjectId,
    fields: &Document,
    exclude: Option<ObjectId>,
) -> Result<(), AppError> {
    let email = fields
        .get_str("email")
        .map_err(|_| AppError::BadRequest("email is required".into()))?;
    // Login looks users up by e-mail alone, so it must be unique platform-wide.
    ensure_unique(
        &db.documents(collections::USERS),
        doc! {},
        "email",
        email,
        exclude,
        "User",
    )
    .await?;
    ensure_references(db, Some(agency_id), fields, REFERENCES).await
}

async fn load(db: &MongoDB, id: ObjectId, agency_id: ObjectId) -> Result<User, AppError> {
    find_scoped(
        &db.collection::<User>(collections::USERS),
        id,
        Some(agency_id),
        "Staff member",
    )
    .await
}

pub async fn list_staff(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    params: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let filter = with_search(scoped(Some(agency_id)), &query, SEARCH_FIELDS);
    let filter = id_filters(filter, params.iter(), &["branch_id", "role_id"])?;
    let page = find_page(
        &db.collection::<User>(collections::USERS),
        filter,
        &query,
        SORT_FIELDS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_staff(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    Ok(HttpResponse::Ok().json(load(&db, id, agency_id).await?))
}

pub async fn create_staff(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    body: web::Json<CreateStaff>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Create)?;
    let input = body.into_inner();
    input.validate()?;

    let mut fields = input.details.to_document()?;
    check_staff(&db, agency_id, &fields, None).await?;
    ensure_capacity(&db, agency_id, collections::USERS, "max_users", "users").await?;

    let now = DateTime::now();
    fields.insert("agency_id", agency_id);
    fields.insert("password", bcrypt::hash(&input.password, bcrypt::DEFAULT_COST)?);
    fields.insert("platform_admin", false);
    fields.insert("created_at", now);
    fields.insert("updated_at", now);

    let id = inserted_id(
        db.documents(collections::USERS)
            .insert_one(fields, None)
            .await?,
    )?;
    info!("Staff {} added to agency {} by {}", id, agency_id, auth.id);
    Ok(HttpResponse::Created().json(load(&db, id, agency_id).await?))
}

pub async fn update_staff(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<StaffInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Update)?;
    let id = parse_id(&path)?;
    let input = body.into_inner();
    input.validate()?;

    let mut fields = input.to_document()?;
    if id == auth.id && !input.active.unwrap_or(true) {
        return Err(AppError::BadRequest("You cannot deactivate your own account".into()));
    }
    check_staff(&db, agency_id, &fields, Some(id)).await?;
    fields.insert("updated_at", DateTime::now());

    let result = db
        .documents(collections::USERS)
        .update_one(by_id(id, Some(agency_id)), doc! { "$set": fields }, None)
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found("Staff member"));
    }
    Ok(HttpResponse::Ok().json(load(&db, id, agency_id).await?))
}

pub async fn delete_staff(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Delete)?;
    let id = parse_id(&path)?;
    if id == auth.id {
        return Err(AppError::BadRequest("You cannot delete your own account".into()));
    }

    let result = db
        .documents(collections::USERS)
        .delete_one(by_id(id, Some(agency_id)), None)
        .await?;
    if result.deleted_count == 0 {
        return Err(AppError::not_found("Staff member"));
    }
    info!("Staff {} removed from agency {} by {}", id, agency_id, auth.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Staff member deleted" })))
}

/// Sets a new password. Staff may always change their own.
pub async fn change_password(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<PasswordChange>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    let agency_id = if id == auth.id {
        auth.agency()?
    } else {
        auth.require(RESOURCE, Action::Update)?
    };
    body.validate()?;

    let hashed = bcrypt::hash(&body.password, bcrypt::DEFAULT_COST)?;
    let result = db
        .documents(collections::USERS)
        .update_one(
            by_id(id, Some(agency_id)),
            doc! { "$set": { "password": hashed, "updated_at": DateTime::now() } },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found("Staff member"));
    }
    info!("Password of {} changed by {}", id, auth.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Password updated" })))
}
