//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs carrying the caller's agency and the permission list
//! of their role, so authorization does not need a database round trip.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::warn;
use mongodb::bson::oid::ObjectId;

use crate::config::Config;
use crate::error::AppError;
use crate::models::{Claims, User};
use crate::permissions::{grants, permission, Action};

pub fn issue_token(
    user: &User,
    role: &str,
    permissions: Vec<String>,
    config: &Config,
) -> Result<String, AppError> {
    let expiration = chrono::Utc::now() + chrono::Duration::hours(config.jwt_ttl_hours);
    let claims = Claims {
        sub: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        agency_id: user.agency_id.map(|id| id.to_hex()),
        role: role.to_string(),
        permissions,
        platform_admin: user.platform_admin,
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("token encoding: {e}")))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::new(Algorithm::HS256),
    )?;
    Ok(data.claims)
}

/// The authenticated caller, taken from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: ObjectId,
    pub agency_id: Option<ObjectId>,
    pub role: String,
    pub permissions: Vec<String>,
    pub platform_admin: bool,
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Result<Self, AppError> {
        let id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))?;
        let agency_id = claims
            .agency_id
            .as_deref()
            .map(ObjectId::parse_str)
            .transpose()
            .map_err(|_| AppError::Unauthorized("Invalid token agency".into()))?;
        Ok(Self {
            id,
            agency_id,
            role: claims.role,
            permissions: claims.permissions,
            platform_admin: claims.platform_admin,
        })
    }

    /// The caller's agency. Platform admins have none and are refused here.
    pub fn agency(&self) -> Result<ObjectId, AppError> {
        self.agency_id
            .ok_or_else(|| AppError::Forbidden("This action needs an agency account".into()))
    }

    pub fn can(&self, resource: &str, action: Action) -> bool {
        grants(&self.permissions, &permission(resource, action))
    }

    /// Checks `resource.action` and returns the caller's agency.
    pub fn require(&self, resource: &str, action: Action) -> Result<ObjectId, AppError> {
        let agency = self.agency()?;
        if self.can(resource, action) {
            Ok(agency)
        } else {
            Err(AppError::Forbidden(format!(
                "Missing permission {}",
                permission(resource, action)
            )))
        }
    }

    pub fn require_platform_admin(&self) -> Result<(), AppError> {
        if self.platform_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Platform administrator only".into()))
        }
    }
}

fn bearer(req: &HttpRequest) -> Result<&str, AppError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".into()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AppError::Unauthorized(
            "Expected 'Bearer <token>' authorization".into(),
        )),
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser, AppError> {
    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| AppError::Internal("configuration not registered".into()))?;
    let token = bearer(req)?;
    let claims = decode_token(token, &config.jwt_secret).map_err(|e| {
        warn!("Rejected token on {}: {e}", req.path());
        e
    })?;
    AuthUser::from_claims(claims)
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::DateTime;

    fn user(platform_admin: bool) -> User {
        User {
            id: Some(ObjectId::new()),
            agency_id: (!platform_admin).then(ObjectId::new),
            branch_id: None,
            role_id: None,
            name: "Asha".into(),
            email: "asha@example.com".into(),
            phone: None,
            password: String::new(),
            platform_admin,
            active: true,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    #[test]
    fn token_round_trip_keeps_agency_and_permissions() {
        let config = Config::default();
        let staff = user(false);
        let token = issue_token(&staff, "Sales", vec!["client.*".into()], &config).unwrap();

        let auth = AuthUser::from_claims(decode_token(&token, &config.jwt_secret).unwrap()).unwrap();
        assert_eq!(Some(auth.id), staff.id);
        assert_eq!(auth.agency_id, staff.agency_id);
        assert!(auth.can("client", Action::Delete));
        assert!(!auth.can("booking", Action::View));
        assert!(matches!(
            auth.require("booking", Action::View),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = issue_token(&user(false), "Owner", vec!["*".into()], &Config::default()).unwrap();
        assert!(matches!(
            decode_token(&token, "another-secret"),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn expired_token_is_unauthorized() {
        let config = Config {
            jwt_ttl_hours: -2,
            ..Config::default()
        };
        let token = issue_token(&user(false), "Owner", vec!["*".into()], &config).unwrap();
        assert!(decode_token(&token, &config.jwt_secret).is_err());
    }

    #[test]
    fn platform_admin_has_no_agency() {
        let config = Config::default();
        let token = issue_token(&user(true), "Platform Admin", vec![], &config).unwrap();
        let auth = AuthUser::from_claims(decode_token(&token, &config.jwt_secret).unwrap()).unwrap();
        assert!(auth.require_platform_admin().is_ok());
        assert!(matches!(auth.agency(), Err(AppError::Forbidden(_))));
    }
}
