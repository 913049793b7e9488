use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::common::{parse_id, parse_optional_id, serialize_datetime, serialize_id_as_hex};
use crate::error::AppError;
use crate::validation::{Validate, Validator};

pub const MIN_PASSWORD_LEN: usize = 8;

fn default_true() -> bool {
    true
}

/// Staff member of an agency, or a platform administrator (no agency).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub agency_id: Option<ObjectId>,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub branch_id: Option<ObjectId>,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub role_id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub platform_admin: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub agency_id: Option<String>,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub platform_admin: bool,
    pub exp: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub agency_id: Option<String>,
    pub branch_id: Option<String>,
    pub platform_admin: bool,
    pub permissions: Vec<String>,
}

impl UserResponse {
    pub fn new(user: &User, role: &str, permissions: Vec<String>) -> Self {
        Self {
            id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: role.to_string(),
            agency_id: user.agency_id.map(|id| id.to_hex()),
            branch_id: user.branch_id.map(|id| id.to_hex()),
            platform_admin: user.platform_admin,
            permissions,
        }
    }
}

/// Fields shared by staff create and update.
#[derive(Deserialize, Debug, Clone)]
pub struct StaffInput {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub branch_id: Option<String>,
    pub role_id: String,
    pub active: Option<bool>,
}

impl Validate for StaffInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .text("name", &self.name, 100)
            .email("email", &self.email)
            .optional_phone("phone", self.phone.as_deref())
            .optional_id("branch_id", self.branch_id.as_deref())
            .id("role_id", &self.role_id)
            .finish()
    }
}

impl StaffInput {
    pub fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "name": self.name.trim(),
            "email": self.email.trim().to_lowercase(),
            "phone": self.phone.clone(),
            "branch_id": parse_optional_id(self.branch_id.as_deref())?,
            "role_id": parse_id(&self.role_id)?,
            "active": self.active.unwrap_or(true),
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateStaff {
    #[serde(flatten)]
    pub details: StaffInput,
    pub password: String,
}

impl Validate for CreateStaff {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        if let Err(AppError::Validation(errors)) = self.details.validate() {
            for e in errors {
                v.error(&e.field, e.message);
            }
        }
        v.min_len("password", &self.password, MIN_PASSWORD_LEN)
            .max_len("password", &self.password, 72)
            .finish()
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct PasswordChange {
    pub password: String,
}

impl Validate for PasswordChange {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .min_len("password", &self.password, MIN_PASSWORD_LEN)
            .max_len("password", &self.password, 72)
            .finish()
    }
}
