use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use futures::FutureExt;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use serde_json::json;

use super::inserted_id;
use crate::auth::AuthUser;
use crate::db::{
    children::{delete_children, sync_children},
    collections,
    repository::{
        by_id, ensure_references, ensure_unreferenced, find_all, find_page, find_scoped,
        id_filters, scoped, with_search,
    },
    MongoDB,
};
use crate::error::AppError;
use crate::models::{
    client::{Client, ClientDetail, ClientInput, FamilyFriend},
    common::{parse_id, ListQuery},
};
use crate::permissions::Action;
use crate::resource::{Dependent, Reference};
use crate::validation::Validate;

const RESOURCE: &str = "client";
const SEARCH_FIELDS: &[&str] = &["name", "phone", "email", "passport_number"];
const SORT_FIELDS: &[&str] = &["name", "created_at", "updated_at"];
const REFERENCES: &[Reference] = &[Reference {
    field: "city_id",
    collection: collections::CITIES,
    label: "City",
}];
const DEPENDENTS: &[Dependent] = &[
    Dependent {
        collection: collections::BOOKINGS,
        field: "client_id",
        label: "bookings",
    },
    Dependent {
        collection: collections::GROUP_CLIENT_BOOKINGS,
        field: "client_id",
        label: "group bookings",
    },
    Dependent {
        collection: collections::HOTEL_BOOKINGS,
        field: "client_id",
        label: "hotel bookings",
    },
    Dependent {
        collection: collections::JOURNEY_BOOKINGS,
        field: "client_id",
        label: "journey bookings",
    },
    Dependent {
        collection: collections::VEHICLE_BOOKINGS,
        field: "client_id",
        label: "vehicle bookings",
    },
];

async fn detail(db: &MongoDB, id: ObjectId, agency_id: ObjectId) -> Result<ClientDetail, AppError> {
    let client = find_scoped(
        &db.collection::<Client>(collections::CLIENTS),
        id,
        Some(agency_id),
        "Client",
    )
    .await?;
    let family_friends = find_all(
        &db.collection::<FamilyFriend>(collections::FAMILY_FRIENDS),
        doc! { "client_id": id },
        doc! { "created_at": 1 },
    )
    .await?;
    Ok(ClientDetail {
        client,
        family_friends,
    })
}

pub async fn list_clients(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    query: web::Query<ListQuery>,
    params: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let filter = with_search(scoped(Some(agency_id)), &query, SEARCH_FIELDS);
    let filter = id_filters(filter, params.iter(), &["city_id"])?;
    let page = find_page(
        &db.collection::<Client>(collections::CLIENTS),
        filter,
        &query,
        SORT_FIELDS,
    )
    .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_client(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::View)?;
    let id = parse_id(&path)?;
    Ok(HttpResponse::Ok().json(detail(&db, id, agency_id).await?))
}

pub async fn create_client(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    body: web::Json<ClientInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Create)?;
    let input = body.into_inner();
    input.validate()?;
    let fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;

    let id = db
        .with_transaction(|session| {
            let db = db.get_ref().clone();
            let mut fields = fields.clone();
            let family = input.family_friends.clone();
            async move {
                let now = DateTime::now();
                fields.insert("agency_id", agency_id);
                fields.insert("created_at", now);
                fields.insert("updated_at", now);
                let id = inserted_id(
                    db.documents(collections::CLIENTS)
                        .insert_one_with_session(fields, None, session)
                        .await?,
                )?;
                sync_children(
                    &db,
                    session,
                    collections::FAMILY_FRIENDS,
                    "client_id",
                    id,
                    agency_id,
                    &family,
                )
                .await?;
                Ok::<_, AppError>(id)
            }
            .boxed()
        })
        .await?;

    info!("Client {} created by {}", id, auth.id);
    Ok(HttpResponse::Created().json(detail(&db, id, agency_id).await?))
}

pub async fn update_client(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
    body: web::Json<ClientInput>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Update)?;
    let id = parse_id(&path)?;
    let input = body.into_inner();
    input.validate()?;
    let fields = input.to_document()?;
    ensure_references(&db, Some(agency_id), &fields, REFERENCES).await?;

    db.with_transaction(|session| {
        let db = db.get_ref().clone();
        let mut fields = fields.clone();
        let family = input.family_friends.clone();
        async move {
            fields.insert("updated_at", DateTime::now());
            let result = db
                .documents(collections::CLIENTS)
                .update_one_with_session(
                    by_id(id, Some(agency_id)),
                    doc! { "$set": fields },
                    None,
                    session,
                )
                .await?;
            if result.matched_count == 0 {
                return Err(AppError::not_found("Client"));
            }
            sync_children(
                &db,
                session,
                collections::FAMILY_FRIENDS,
                "client_id",
                id,
                agency_id,
                &family,
            )
            .await
        }
        .boxed()
    })
    .await?;

    Ok(HttpResponse::Ok().json(detail(&db, id, agency_id).await?))
}

pub async fn delete_client(
    auth: AuthUser,
    db: web::Data<MongoDB>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let agency_id = auth.require(RESOURCE, Action::Delete)?;
    let id = parse_id(&path)?;
    if db
        .documents(collections::CLIENTS)
        .count_documents(by_id(id, Some(agency_id)), None)
        .await?
        == 0
    {
        return Err(AppError::not_found("Client"));
    }
    ensure_unreferenced(&db, id, "Client", DEPENDENTS).await?;

    db.with_transaction(|session| {
        let db = db.get_ref().clone();
        async move {
            delete_children(&db, session, collections::FAMILY_FRIENDS, "client_id", id).await?;
            db.documents(collections::CLIENTS)
                .delete_one_with_session(by_id(id, Some(agency_id)), None, session)
                .await?;
            Ok::<_, AppError>(())
        }
        .boxed()
    })
    .await?;

    info!("Client {} deleted by {}", id, auth.id);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Client deleted" })))
}
