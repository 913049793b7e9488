use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::common::{
    parse_optional_id, serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex,
};
use crate::db::collections;
use crate::error::AppError;
use crate::permissions;
use crate::resource::{Dependent, Reference, Resource};
use crate::validation::{Validate, Validator};

/// Tenant organization using the platform.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Agency {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub gst_number: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    pub active: bool,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AgencyUpdate {
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub gst_number: Option<String>,
    pub website: Option<String>,
}

impl Validate for AgencyUpdate {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .text("name", &self.name, 150)
            .phone("phone", &self.phone)
            .optional_max_len("address", self.address.as_deref(), 500)
            .optional_max_len("gst_number", self.gst_number.as_deref(), 15)
            .optional_max_len("website", self.website.as_deref(), 200)
            .finish()
    }
}

impl AgencyUpdate {
    pub fn to_document(&self) -> Document {
        doc! {
            "name": self.name.trim(),
            "phone": &self.phone,
            "address": self.address.clone(),
            "gst_number": self.gst_number.clone(),
            "website": self.website.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct AgencyStatus {
    pub active: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Branch {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub city_id: Option<ObjectId>,
    #[serde(default)]
    pub is_head_office: bool,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BranchInput {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub city_id: Option<String>,
    #[serde(default)]
    pub is_head_office: bool,
}

impl Validate for BranchInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .text("name", &self.name, 100)
            .optional_max_len("address", self.address.as_deref(), 500)
            .optional_phone("phone", self.phone.as_deref())
            .optional_email("email", self.email.as_deref())
            .optional_id("city_id", self.city_id.as_deref())
            .finish()
    }
}

impl Resource for Branch {
    type Input = BranchInput;

    const COLLECTION: &'static str = collections::BRANCHES;
    const LABEL: &'static str = "Branch";
    const PERMISSION: &'static str = "branch";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "address", "phone", "email"];
    const FILTERS: &'static [&'static str] = &["city_id"];
    const QUOTA: Option<&'static str> = Some("max_branches");
    const REFERENCES: &'static [Reference] = &[Reference {
        field: "city_id",
        collection: collections::CITIES,
        label: "City",
    }];
    const DEPENDENTS: &'static [Dependent] = &[
        Dependent {
            collection: collections::USERS,
            field: "branch_id",
            label: "staff members",
        },
        Dependent {
            collection: collections::BOOKINGS,
            field: "branch_id",
            label: "bookings",
        },
        Dependent {
            collection: collections::GROUP_BOOKINGS,
            field: "branch_id",
            label: "group bookings",
        },
    ];

    fn to_document(input: &BranchInput) -> Result<Document, AppError> {
        Ok(doc! {
            "name": input.name.trim(),
            "address": input.address.clone(),
            "phone": input.phone.clone(),
            "email": input.email.clone(),
            "city_id": parse_optional_id(input.city_id.as_deref())?,
            "is_head_office": input.is_head_office,
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Role {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

pub const OWNER_ROLE: &str = "Owner";

#[derive(Deserialize, Debug, Clone)]
pub struct RoleInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Validate for RoleInput {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.text("name", &self.name, 60)
            .optional_max_len("description", self.description.as_deref(), 300);
        for (i, p) in self.permissions.iter().enumerate() {
            if !permissions::is_known(p) {
                v.error(&format!("permissions[{i}]"), format!("unknown permission '{p}'"));
            }
        }
        v.finish()
    }
}

impl Resource for Role {
    type Input = RoleInput;

    const COLLECTION: &'static str = collections::ROLES;
    const LABEL: &'static str = "Role";
    const PERMISSION: &'static str = "role";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description"];
    const DEPENDENTS: &'static [Dependent] = &[Dependent {
        collection: collections::USERS,
        field: "role_id",
        label: "staff members",
    }];

    fn to_document(input: &RoleInput) -> Result<Document, AppError> {
        let mut permissions = input.permissions.clone();
        permissions.sort();
        permissions.dedup();
        Ok(doc! {
            "name": input.name.trim(),
            "description": input.description.clone(),
            "permissions": permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_rejects_unknown_permissions() {
        let input = RoleInput {
            name: "Accounts".into(),
            description: None,
            permissions: vec!["receipt.view".into(), "receipt.teleport".into()],
        };
        match input.validate() {
            Err(AppError::Validation(errors)) => assert_eq!(errors[0].field, "permissions[1]"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn role_document_dedups_permissions() {
        let input = RoleInput {
            name: "Sales".into(),
            description: None,
            permissions: vec![
                "client.view".into(),
                "booking.*".into(),
                "client.view".into(),
            ],
        };
        let doc = Role::to_document(&input).unwrap();
        let perms = doc.get_array("permissions").unwrap();
        assert_eq!(perms.len(), 2);
    }

    #[test]
    fn branch_rejects_bad_city_id() {
        let input = BranchInput {
            name: "Pune".into(),
            address: None,
            phone: None,
            email: None,
            city_id: Some("pune".into()),
            is_head_office: false,
        };
        assert!(input.validate().is_err());
    }
}
