use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::common::{
    parse_id, parse_optional_id, serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex,
};
use crate::db::collections;
use crate::error::AppError;
use crate::resource::{Dependent, Reference, Resource, Scope};
use crate::validation::{Validate, Validator};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Bank {
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
    pub account_name: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub ifsc_code: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BankInput {
    pub name: String,
    pub account_name: Option<String>,
    pub account_number: Option<String>,
    pub ifsc_code: Option<String>,
    pub branch: Option<String>,
}

impl Validate for BankInput {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.text("name", &self.name, 100)
            .optional_max_len("account_name", self.account_name.as_deref(), 100)
            .optional_max_len("account_number", self.account_number.as_deref(), 34)
            .optional_max_len("branch", self.branch.as_deref(), 100);
        if let Some(ifsc) = self.ifsc_code.as_deref().filter(|s| !s.is_empty()) {
            if ifsc.len() != 11 || !ifsc.chars().all(|c| c.is_ascii_alphanumeric()) {
                v.error("ifsc_code", "must be 11 letters or digits");
            }
        }
        v.finish()
    }
}

impl Resource for Bank {
    type Input = BankInput;

    const COLLECTION: &'static str = collections::BANKS;
    const LABEL: &'static str = "Bank";
    const PERMISSION: &'static str = "bank";
    const SEARCH_FIELDS: &'static [&'static str] =
        &["name", "account_name", "account_number", "ifsc_code"];
    const DEPENDENTS: &'static [Dependent] = &[Dependent {
        collection: collections::RECEIPTS,
        field: "bank_id",
        label: "receipts",
    }];

    fn to_document(input: &BankInput) -> Result<Document, AppError> {
        Ok(doc! {
            "name": input.name.trim(),
            "account_name": input.account_name.clone(),
            "account_number": input.account_number.clone(),
            "ifsc_code": input.ifsc_code.as_ref().map(|s| s.to_uppercase()),
            "branch": input.branch.clone(),
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Hotel {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub city_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub star_rating: Option<i32>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct HotelInput {
    pub city_id: String,
    pub name: String,
    pub star_rating: Option<i32>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub contact_person: Option<String>,
}

impl Validate for HotelInput {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.id("city_id", &self.city_id)
            .text("name", &self.name, 150)
            .optional_max_len("address", self.address.as_deref(), 500)
            .optional_phone("phone", self.phone.as_deref())
            .optional_email("email", self.email.as_deref())
            .optional_max_len("contact_person", self.contact_person.as_deref(), 100);
        if let Some(stars) = self.star_rating {
            v.range("star_rating", f64::from(stars), 1.0, 7.0);
        }
        v.finish()
    }
}

impl Resource for Hotel {
    type Input = HotelInput;

    const COLLECTION: &'static str = collections::HOTELS;
    const LABEL: &'static str = "Hotel";
    const PERMISSION: &'static str = "hotel";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "address", "contact_person"];
    const SORT_FIELDS: &'static [&'static str] = &["name", "star_rating", "created_at"];
    const UNIQUE_WITHIN: &'static [&'static str] = &["city_id"];
    const FILTERS: &'static [&'static str] = &["city_id"];
    const REFERENCES: &'static [Reference] = &[Reference {
        field: "city_id",
        collection: collections::CITIES,
        label: "City",
    }];
    const DEPENDENTS: &'static [Dependent] = &[
        Dependent {
            collection: collections::HOTEL_BOOKINGS,
            field: "hotel_id",
            label: "hotel bookings",
        },
        Dependent {
            collection: collections::VEHICLE_HOTEL_BOOKINGS,
            field: "hotel_id",
            label: "vehicle booking hotel legs",
        },
    ];

    fn to_document(input: &HotelInput) -> Result<Document, AppError> {
        Ok(doc! {
            "city_id": parse_id(&input.city_id)?,
            "name": input.name.trim(),
            "star_rating": input.star_rating,
            "address": input.address.clone(),
            "phone": input.phone.clone(),
            "email": input.email.clone(),
            "contact_person": input.contact_person.clone(),
        })
    }
}

/// Destination sector (e.g. "Kerala Backwaters") bookings are filed under.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Sector {
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
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SectorInput {
    pub name: String,
    pub description: Option<String>,
}

impl Validate for SectorInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .text("name", &self.name, 100)
            .optional_max_len("description", self.description.as_deref(), 500)
            .finish()
    }
}

impl Resource for Sector {
    type Input = SectorInput;

    const COLLECTION: &'static str = collections::SECTORS;
    const LABEL: &'static str = "Sector";
    const PERMISSION: &'static str = "sector";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description"];
    const DEPENDENTS: &'static [Dependent] = &[
        Dependent {
            collection: collections::BOOKINGS,
            field: "sector_id",
            label: "bookings",
        },
        Dependent {
            collection: collections::GROUP_BOOKINGS,
            field: "sector_id",
            label: "group bookings",
        },
    ];

    fn to_document(input: &SectorInput) -> Result<Document, AppError> {
        Ok(doc! {
            "name": input.name.trim(),
            "description": input.description.clone(),
        })
    }
}

/// Billable service line (visa, insurance, sightseeing, ...).
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Service {
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
    pub tax_percent: f64,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServiceInput {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub tax_percent: f64,
}

impl Validate for ServiceInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .text("name", &self.name, 100)
            .optional_max_len("description", self.description.as_deref(), 500)
            .range("tax_percent", self.tax_percent, 0.0, 100.0)
            .finish()
    }
}

impl Resource for Service {
    type Input = ServiceInput;

    const COLLECTION: &'static str = collections::SERVICES;
    const LABEL: &'static str = "Service";
    const PERMISSION: &'static str = "service";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description"];
    const DEPENDENTS: &'static [Dependent] = &[Dependent {
        collection: collections::TOUR_BOOKING_DETAILS,
        field: "service_id",
        label: "booking details",
    }];

    fn to_document(input: &ServiceInput) -> Result<Document, AppError> {
        Ok(doc! {
            "name": input.name.trim(),
            "description": input.description.clone(),
            "tax_percent": input.tax_percent,
        })
    }
}

/// Trade fair or event that clients travel to.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Fair {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    pub name: String,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub city_id: Option<ObjectId>,
    #[serde(default)]
    pub venue: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FairInput {
    pub name: String,
    pub city_id: Option<String>,
    pub venue: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub description: Option<String>,
}

impl Validate for FairInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .text("name", &self.name, 150)
            .optional_id("city_id", self.city_id.as_deref())
            .optional_max_len("venue", self.venue.as_deref(), 200)
            .not_before("end_date", self.start_date, self.end_date)
            .optional_max_len("description", self.description.as_deref(), 1000)
            .finish()
    }
}

impl Resource for Fair {
    type Input = FairInput;

    const COLLECTION: &'static str = collections::FAIRS;
    const LABEL: &'static str = "Fair";
    const PERMISSION: &'static str = "fair";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "venue", "description"];
    const SORT_FIELDS: &'static [&'static str] = &["name", "start_date", "created_at"];
    const UNIQUE_WITHIN: &'static [&'static str] = &["start_date"];
    const FILTERS: &'static [&'static str] = &["city_id"];
    const REFERENCES: &'static [Reference] = &[Reference {
        field: "city_id",
        collection: collections::CITIES,
        label: "City",
    }];
    const DEPENDENTS: &'static [Dependent] = &[Dependent {
        collection: collections::BOOKINGS,
        field: "fair_id",
        label: "bookings",
    }];

    fn to_document(input: &FairInput) -> Result<Document, AppError> {
        Ok(doc! {
            "name": input.name.trim(),
            "city_id": parse_optional_id(input.city_id.as_deref())?,
            "venue": input.venue.clone(),
            "start_date": input.start_date.to_string(),
            "end_date": input.end_date.to_string(),
            "description": input.description.clone(),
        })
    }
}

/// Subscription plan offered to agencies. Shared by the whole platform.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Package {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub duration_days: i64,
    pub max_users: i64,
    pub max_branches: i64,
    pub active: bool,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PackageInput {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration_days: i64,
    pub max_users: i64,
    pub max_branches: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Ten years.
pub const MAX_PACKAGE_DAYS: i64 = 3650;

impl Validate for PackageInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .text("name", &self.name, 100)
            .optional_max_len("description", self.description.as_deref(), 1000)
            .non_negative("price", self.price)
            .at_least("duration_days", self.duration_days, 1)
            .at_most("duration_days", self.duration_days, MAX_PACKAGE_DAYS)
            .at_least("max_users", self.max_users, 1)
            .at_least("max_branches", self.max_branches, 1)
            .finish()
    }
}

impl Resource for Package {
    type Input = PackageInput;

    const COLLECTION: &'static str = collections::PACKAGES;
    const LABEL: &'static str = "Package";
    const PERMISSION: &'static str = "package";
    const SCOPE: Scope = Scope::Platform;
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "description"];
    const SORT_FIELDS: &'static [&'static str] = &["name", "price", "duration_days", "created_at"];
    const DEPENDENTS: &'static [Dependent] = &[Dependent {
        collection: collections::SUBSCRIPTIONS,
        field: "package_id",
        label: "subscriptions",
    }];

    fn to_document(input: &PackageInput) -> Result<Document, AppError> {
        Ok(doc! {
            "name": input.name.trim(),
            "description": input.description.clone(),
            "price": input.price,
            "duration_days": input.duration_days,
            "max_users": input.max_users,
            "max_branches": input.max_branches,
            "active": input.active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fair_end_date_cannot_precede_start() {
        let input = FairInput {
            name: "ITB Berlin".into(),
            city_id: None,
            venue: None,
            start_date: NaiveDate::from_ymd_opt(2027, 3, 4).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2027, 3, 2).unwrap(),
            description: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn bank_ifsc_shape() {
        let mut input = BankInput {
            name: "HDFC".into(),
            account_name: None,
            account_number: None,
            ifsc_code: Some("HDFC0001234".into()),
            branch: None,
        };
        assert!(input.validate().is_ok());
        input.ifsc_code = Some("HDFC-1".into());
        assert!(input.validate().is_err());
    }

    #[test]
    fn package_needs_positive_limits() {
        let input = PackageInput {
            name: "Starter".into(),
            description: None,
            price: 4999.0,
            duration_days: 0,
            max_users: 3,
            max_branches: 1,
            active: true,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn package_duration_is_capped() {
        let mut input = PackageInput {
            name: "Lifetime".into(),
            description: None,
            price: 99999.0,
            duration_days: MAX_PACKAGE_DAYS,
            max_users: 3,
            max_branches: 1,
            active: true,
        };
        assert!(input.validate().is_ok());
        input.duration_days = 100_000_000;
        let Err(AppError::Validation(details)) = input.validate() else {
            panic!("expected a validation error");
        };
        assert_eq!(details[0].field, "duration_days");
    }

    #[test]
    fn fair_dates_are_stored_as_iso_strings() {
        let input = FairInput {
            name: "SATTE".into(),
            city_id: None,
            venue: Some("Yashobhoomi".into()),
            start_date: NaiveDate::from_ymd_opt(2027, 2, 10).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2027, 2, 12).unwrap(),
            description: None,
        };
        let doc = Fair::to_document(&input).unwrap();
        assert_eq!(doc.get_str("start_date").unwrap(), "2027-02-10");
    }
}
