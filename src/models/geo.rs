use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::common::{parse_id, serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex};
use crate::db::collections;
use crate::error::AppError;
use crate::resource::{Dependent, Reference, Resource};
use crate::validation::{Validate, Validator};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Country {
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
    pub code: Option<String>,
    #[serde(default)]
    pub dial_code: Option<String>,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CountryInput {
    pub name: String,
    pub code: Option<String>,
    pub dial_code: Option<String>,
}

impl Validate for CountryInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .text("name", &self.name, 100)
            .optional_max_len("code", self.code.as_deref(), 3)
            .optional_max_len("dial_code", self.dial_code.as_deref(), 6)
            .finish()
    }
}

impl Resource for Country {
    type Input = CountryInput;

    const COLLECTION: &'static str = collections::COUNTRIES;
    const LABEL: &'static str = "Country";
    const PERMISSION: &'static str = "country";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "code"];
    const DEPENDENTS: &'static [Dependent] = &[Dependent {
        collection: collections::STATES,
        field: "country_id",
        label: "states",
    }];

    fn to_document(input: &CountryInput) -> Result<Document, AppError> {
        Ok(doc! {
            "name": input.name.trim(),
            "code": input.code.as_ref().map(|c| c.trim().to_uppercase()),
            "dial_code": input.dial_code.clone(),
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct State {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub country_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StateInput {
    pub country_id: String,
    pub name: String,
    pub code: Option<String>,
}

impl Validate for StateInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .id("country_id", &self.country_id)
            .text("name", &self.name, 100)
            .optional_max_len("code", self.code.as_deref(), 10)
            .finish()
    }
}

impl Resource for State {
    type Input = StateInput;

    const COLLECTION: &'static str = collections::STATES;
    const LABEL: &'static str = "State";
    const PERMISSION: &'static str = "state";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "code"];
    const UNIQUE_WITHIN: &'static [&'static str] = &["country_id"];
    const FILTERS: &'static [&'static str] = &["country_id"];
    const REFERENCES: &'static [Reference] = &[Reference {
        field: "country_id",
        collection: collections::COUNTRIES,
        label: "Country",
    }];
    const DEPENDENTS: &'static [Dependent] = &[Dependent {
        collection: collections::CITIES,
        field: "state_id",
        label: "cities",
    }];

    fn to_document(input: &StateInput) -> Result<Document, AppError> {
        Ok(doc! {
            "country_id": parse_id(&input.country_id)?,
            "name": input.name.trim(),
            "code": input.code.clone(),
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct City {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub state_id: ObjectId,
    pub name: String,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CityInput {
    pub state_id: String,
    pub name: String,
}

impl Validate for CityInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .id("state_id", &self.state_id)
            .text("name", &self.name, 100)
            .finish()
    }
}

impl Resource for City {
    type Input = CityInput;

    const COLLECTION: &'static str = collections::CITIES;
    const LABEL: &'static str = "City";
    const PERMISSION: &'static str = "city";
    const SEARCH_FIELDS: &'static [&'static str] = &["name"];
    const UNIQUE_WITHIN: &'static [&'static str] = &["state_id"];
    const FILTERS: &'static [&'static str] = &["state_id"];
    const REFERENCES: &'static [Reference] = &[Reference {
        field: "state_id",
        collection: collections::STATES,
        label: "State",
    }];
    const DEPENDENTS: &'static [Dependent] = &[
        Dependent {
            collection: collections::HOTELS,
            field: "city_id",
            label: "hotels",
        },
        Dependent {
            collection: collections::CLIENTS,
            field: "city_id",
            label: "clients",
        },
        Dependent {
            collection: collections::BRANCHES,
            field: "city_id",
            label: "branches",
        },
        Dependent {
            collection: collections::FAIRS,
            field: "city_id",
            label: "fairs",
        },
    ];

    fn to_document(input: &CityInput) -> Result<Document, AppError> {
        Ok(doc! {
            "state_id": parse_id(&input.state_id)?,
            "name": input.name.trim(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_code_is_uppercased() {
        let input = CountryInput {
            name: "India".into(),
            code: Some(" in ".into()),
            dial_code: Some("+91".into()),
        };
        let doc = Country::to_document(&input).unwrap();
        assert_eq!(doc.get_str("code").unwrap(), "IN");
    }

    #[test]
    fn state_requires_country() {
        let input = StateInput {
            country_id: String::new(),
            name: "Goa".into(),
            code: None,
        };
        assert!(input.validate().is_err());
    }
}
