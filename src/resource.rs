//! Reference data that shares one CRUD shape: list, get, create, update, delete.
//!
//! Each entity describes its collection, searchable fields, uniqueness rule and
//! relations through associated constants; the generic handlers in
//! [`crate::handlers::resources`] do the rest.

use mongodb::bson::Document;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::AppError;
use crate::validation::Validate;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Rows belong to one agency and carry `agency_id`.
    Agency,
    /// Rows are shared by all agencies; only a platform admin may write them.
    Platform,
}

impl Scope {
    pub fn is_agency(self) -> bool {
        self == Scope::Agency
    }
}

/// A foreign key that must resolve within the caller's agency.
#[derive(Clone, Copy, Debug)]
pub struct Reference {
    pub field: &'static str,
    pub collection: &'static str,
    pub label: &'static str,
}

/// A collection whose `field` points at this resource.
#[derive(Clone, Copy, Debug)]
pub struct Dependent {
    pub collection: &'static str,
    pub field: &'static str,
    pub label: &'static str,
}

pub trait Resource: DeserializeOwned + Serialize + Unpin + Send + Sync + 'static {
    type Input: DeserializeOwned + Validate + Send + 'static;

    const COLLECTION: &'static str;
    const LABEL: &'static str;
    /// Prefix of the permission strings, e.g. `hotel` for `hotel.create`.
    const PERMISSION: &'static str;
    const SCOPE: Scope = Scope::Agency;
    const SEARCH_FIELDS: &'static [&'static str];
    const SORT_FIELDS: &'static [&'static str] = &["name", "created_at", "updated_at"];
    const UNIQUE_FIELD: &'static str = "name";
    /// Extra fields the unique name is scoped by, e.g. a city name is unique per state.
    const UNIQUE_WITHIN: &'static [&'static str] = &[];
    /// Id fields accepted as list filters, e.g. `?state_id=`.
    const FILTERS: &'static [&'static str] = &[];
    const REFERENCES: &'static [Reference] = &[];
    const DEPENDENTS: &'static [Dependent] = &[];
    /// Package field capping how many rows an agency may hold, e.g. `max_branches`.
    const QUOTA: Option<&'static str> = None;

    /// Turns a validated input into the fields to store. Bookkeeping fields
    /// (`agency_id`, timestamps) are added by the caller.
    fn to_document(input: &Self::Input) -> Result<Document, AppError>;
}
