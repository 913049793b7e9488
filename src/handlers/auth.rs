use actix_web::{web, HttpResponse};
use futures::FutureExt;
use log::{info, warn};
use mongodb::bson::{doc, DateTime};

use super::inserted_id;
use crate::auth::{issue_token, AuthUser};
use crate::config::Config;
use crate::db::{collections, repository::ensure_unique, MongoDB};
use crate::error::AppError;
use crate::models::{
    agency::{Agency, Role, OWNER_ROLE},
    AuthResponse, LoginRequest, RegisterRequest, User, UserResponse,
};
use crate::permissions::ALL;
use crate::validation::Validate;

const PLATFORM_ROLE: &str = "Platform Admin";
const HEAD_OFFICE: &str = "Head Office";

/// Role name and permissions to put in the caller's token.
async fn resolve_role(db: &MongoDB, user: &User) -> Result<(String, Vec<String>), AppError> {
    if user.platform_admin {
        return Ok((PLATFORM_ROLE.to_string(), Vec::new()));
    }
    let Some(role_id) = user.role_id else {
        return Ok((String::new(), Vec::new()));
    };
    let role = db
        .collection::<Role>(collections::ROLES)
        .find_one(doc! { "_id": role_id, "agency_id": user.agency_id }, None)
        .await?;
    Ok(role
        .map(|r| (r.name, r.permissions))
        .unwrap_or_default())
}

pub async fn register(
    db: web::Data<MongoDB>,
    config: web::Data<Config>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    request.validate()?;

    let owner_email = request.owner_email.trim().to_lowercase();
    let agency_email = request.agency_email.trim().to_lowercase();
    ensure_unique(
        &db.documents(collections::USERS),
        doc! {},
        "email",
        &owner_email,
        None,
        "User",
    )
    .await?;
    ensure_unique(
        &db.documents(collections::AGENCIES),
        doc! {},
        "email",
        &agency_email,
        None,
        "Agency",
    )
    .await?;

    let hashed_password = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)?;

    let user_id = db
        .with_transaction(|session| {
            let db = db.get_ref().clone();
            let request = request.clone();
            let owner_email = owner_email.clone();
            let agency_email = agency_email.clone();
            let hashed_password = hashed_password.clone();
            async move {
                let now = DateTime::now();
                let agency_id = inserted_id(
                    db.documents(collections::AGENCIES)
                        .insert_one_with_session(
                            doc! {
                                "name": request.agency_name.trim(),
                                "email": agency_email,
                                "phone": request.agency_phone.trim(),
                                "address": request.address.clone(),
                                "gst_number": null,
                                "website": null,
                                "active": true,
                                "created_at": now,
                                "updated_at": now,
                            },
                            None,
                            session,
                        )
                        .await?,
                )?;
                let branch_id = inserted_id(
                    db.documents(collections::BRANCHES)
                        .insert_one_with_session(
                            doc! {
                                "agency_id": agency_id,
                                "name": HEAD_OFFICE,
                                "address": request.address.clone(),
                                "phone": request.agency_phone.trim(),
                                "email": null,
                                "city_id": null,
                                "is_head_office": true,
                                "created_at": now,
                                "updated_at": now,
                            },
                            None,
                            session,
                        )
                        .await?,
                )?;
                let role_id = inserted_id(
                    db.documents(collections::ROLES)
                        .insert_one_with_session(
                            doc! {
                                "agency_id": agency_id,
                                "name": OWNER_ROLE,
                                "description": "Full access to the agency",
                                "permissions": [ALL],
                                "created_at": now,
                                "updated_at": now,
                            },
                            None,
                            session,
                        )
                        .await?,
                )?;
                inserted_id(
                    db.documents(collections::USERS)
                        .insert_one_with_session(
                            doc! {
                                "agency_id": agency_id,
                                "branch_id": branch_id,
                                "role_id": role_id,
                                "name": request.owner_name.trim(),
                                "email": owner_email,
                                "phone": null,
                                "password": hashed_password,
                                "platform_admin": false,
                                "active": true,
                                "created_at": now,
                                "updated_at": now,
                            },
                            None,
                            session,
                        )
                        .await?,
                )
            }
            .boxed()
        })
        .await?;

    let user = db
        .collection::<User>(collections::USERS)
        .find_one(doc! { "_id": user_id }, None)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let permissions = vec![ALL.to_string()];
    let token = issue_token(&user, OWNER_ROLE, permissions.clone(), &config)?;
    info!("Registered agency {} with owner {}", request.agency_name, user.email);

    Ok(HttpResponse::Created().json(AuthResponse {
        token,
        user: UserResponse::new(&user, OWNER_ROLE, permissions),
    }))
}

pub async fn login(
    db: web::Data<MongoDB>,
    config: web::Data<Config>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    let credentials = body.into_inner();
    credentials.validate()?;
    let email = credentials.email.trim().to_lowercase();

    let user = db
        .collection::<User>(collections::USERS)
        .find_one(doc! { "email": email.as_str() }, None)
        .await?;
    let Some(user) = user.filter(|u| bcrypt::verify(&credentials.password, &u.password).unwrap_or(false)) else {
        warn!("Failed login for {email}");
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    };
    if !user.active {
        warn!("Login attempt by deactivated user {email}");
        return Err(AppError::Forbidden("This account has been deactivated".into()));
    }
    if let Some(agency_id) = user.agency_id {
        let agency = db
            .collection::<Agency>(collections::AGENCIES)
            .find_one(doc! { "_id": agency_id }, None)
            .await?;
        if !agency.is_some_and(|a| a.active) {
            warn!("Login attempt for suspended agency {agency_id}");
            return Err(AppError::Forbidden("This agency has been suspended".into()));
        }
    }

    let (role, permissions) = resolve_role(&db, &user).await?;
    let token = issue_token(&user, &role, permissions.clone(), &config)?;
    info!("User {} logged in", user.email);

    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        user: UserResponse::new(&user, &role, permissions),
    }))
}

pub async fn me(auth: AuthUser, db: web::Data<MongoDB>) -> Result<HttpResponse, AppError> {
    let user = db
        .collection::<User>(collections::USERS)
        .find_one(doc! { "_id": auth.id }, None)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".into()))?;
    let (role, permissions) = resolve_role(&db, &user).await?;
    Ok(HttpResponse::Ok().json(UserResponse::new(&user, &role, permissions)))
}
