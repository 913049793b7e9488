use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::common::{parse_optional_id, serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex};
use crate::db::children::ChildInput;
use crate::error::AppError;
use crate::validation::{Validate, Validator};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Client {
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
    pub email: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub alternate_phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub city_id: Option<ObjectId>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub anniversary: Option<NaiveDate>,
    #[serde(default)]
    pub passport_number: Option<String>,
    #[serde(default)]
    pub passport_expiry: Option<NaiveDate>,
    #[serde(default)]
    pub pan_number: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

/// Relative or travel companion stored with a client.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FamilyFriend {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub client_id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub passport_number: Option<String>,
    #[serde(default)]
    pub passport_expiry: Option<NaiveDate>,
}

#[derive(Serialize, Debug)]
pub struct ClientDetail {
    #[serde(flatten)]
    pub client: Client,
    pub family_friends: Vec<FamilyFriend>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FamilyFriendInput {
    pub id: Option<String>,
    pub name: String,
    pub relation: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub passport_number: Option<String>,
    pub passport_expiry: Option<NaiveDate>,
}

impl Validate for FamilyFriendInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .optional_id("id", self.id.as_deref())
            .text("name", &self.name, 100)
            .optional_max_len("relation", self.relation.as_deref(), 50)
            .optional_phone("phone", self.phone.as_deref())
            .optional_max_len("passport_number", self.passport_number.as_deref(), 20)
            .finish()
    }
}

impl ChildInput for FamilyFriendInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "name": self.name.trim(),
            "relation": self.relation.clone(),
            "date_of_birth": self.date_of_birth.map(|d| d.to_string()),
            "phone": self.phone.clone(),
            "passport_number": self.passport_number.clone(),
            "passport_expiry": self.passport_expiry.map(|d| d.to_string()),
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct ClientInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: String,
    pub alternate_phone: Option<String>,
    pub address: Option<String>,
    pub city_id: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub anniversary: Option<NaiveDate>,
    pub passport_number: Option<String>,
    pub passport_expiry: Option<NaiveDate>,
    pub pan_number: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub family_friends: Vec<FamilyFriendInput>,
}

impl Validate for ClientInput {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.text("name", &self.name, 100)
            .optional_email("email", self.email.as_deref())
            .phone("phone", &self.phone)
            .optional_phone("alternate_phone", self.alternate_phone.as_deref())
            .optional_max_len("address", self.address.as_deref(), 500)
            .optional_id("city_id", self.city_id.as_deref())
            .optional_max_len("passport_number", self.passport_number.as_deref(), 20)
            .optional_max_len("notes", self.notes.as_deref(), 2000)
            .nested("family_friends", &self.family_friends);
        if let Some(pan) = self.pan_number.as_deref().filter(|s| !s.is_empty()) {
            if !is_pan(pan) {
                v.error("pan_number", "must look like ABCDE1234F");
            }
        }
        v.finish()
    }
}

impl ClientInput {
    pub fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "name": self.name.trim(),
            "email": self.email.as_ref().map(|e| e.trim().to_lowercase()),
            "phone": self.phone.trim(),
            "alternate_phone": self.alternate_phone.clone(),
            "address": self.address.clone(),
            "city_id": parse_optional_id(self.city_id.as_deref())?,
            "date_of_birth": self.date_of_birth.map(|d| d.to_string()),
            "anniversary": self.anniversary.map(|d| d.to_string()),
            "passport_number": self.passport_number.clone(),
            "passport_expiry": self.passport_expiry.map(|d| d.to_string()),
            "pan_number": self.pan_number.as_ref().map(|p| p.to_uppercase()),
            "notes": self.notes.clone(),
        })
    }
}

/// Indian permanent account number: five letters, four digits, one letter.
fn is_pan(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes[..5].iter().all(u8::is_ascii_alphabetic)
        && bytes[5..9].iter().all(u8::is_ascii_digit)
        && bytes[9].is_ascii_alphabetic()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ClientInput {
        serde_json::from_value(serde_json::json!({
            "name": "Ravi Menon",
            "phone": "9876543210",
            "email": "Ravi@Example.com",
            "family_friends": [
                { "name": "Lakshmi Menon", "relation": "Spouse" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn valid_client_passes() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn family_errors_are_prefixed() {
        let mut client = input();
        client.family_friends[0].name = String::new();
        match client.validate() {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors[0].field, "family_friends[0].name")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn pan_format() {
        assert!(is_pan("ABCDE1234F"));
        assert!(!is_pan("ABCD12345F"));
        assert!(!is_pan("ABCDE1234"));
    }

    #[test]
    fn document_normalizes_email_and_dates() {
        let mut client = input();
        client.date_of_birth = NaiveDate::from_ymd_opt(1985, 7, 14);
        let doc = client.to_document().unwrap();
        assert_eq!(doc.get_str("email").unwrap(), "ravi@example.com");
        assert_eq!(doc.get_str("date_of_birth").unwrap(), "1985-07-14");
    }
}
