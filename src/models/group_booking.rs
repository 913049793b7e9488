use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::booking::{round2, BookingStatus};
use super::common::{
    parse_id, parse_optional_id, serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex,
};
use crate::db::children::ChildInput;
use crate::error::AppError;
use crate::validation::{Validate, Validator};

/// Several clients travelling together on one tour.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GroupBooking {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub branch_id: Option<ObjectId>,
    pub booking_number: String,
    pub group_name: String,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub sector_id: Option<ObjectId>,
    pub destination: String,
    pub travel_date: NaiveDate,
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    pub total_amount: f64,
    pub status: BookingStatus,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub created_by: ObjectId,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

/// One client's share of a group booking.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GroupClientBooking {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub group_booking_id: ObjectId,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub client_id: ObjectId,
    pub pax: i32,
    #[serde(default)]
    pub room_type: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct GroupBookingDetail {
    #[serde(flatten)]
    pub booking: GroupBooking,
    pub clients: Vec<GroupClientBooking>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GroupClientInput {
    pub id: Option<String>,
    pub client_id: String,
    #[serde(default = "one")]
    pub pax: i32,
    pub room_type: Option<String>,
    pub amount: f64,
    pub remarks: Option<String>,
}

fn one() -> i32 {
    1
}

impl Validate for GroupClientInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .optional_id("id", self.id.as_deref())
            .id("client_id", &self.client_id)
            .at_least("pax", i64::from(self.pax), 1)
            .optional_max_len("room_type", self.room_type.as_deref(), 50)
            .non_negative("amount", self.amount)
            .optional_max_len("remarks", self.remarks.as_deref(), 500)
            .finish()
    }
}

impl ChildInput for GroupClientInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "client_id": parse_id(&self.client_id)?,
            "pax": self.pax,
            "room_type": self.room_type.clone(),
            "amount": round2(self.amount),
            "remarks": self.remarks.clone(),
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct GroupBookingInput {
    pub branch_id: Option<String>,
    pub group_name: String,
    pub sector_id: Option<String>,
    pub destination: String,
    pub travel_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub remarks: Option<String>,
    #[serde(default)]
    pub status: BookingStatus,
    #[serde(default)]
    pub clients: Vec<GroupClientInput>,
}

impl Validate for GroupBookingInput {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.optional_id("branch_id", self.branch_id.as_deref())
            .optional_id("sector_id", self.sector_id.as_deref())
            .text("group_name", &self.group_name, 150)
            .text("destination", &self.destination, 200)
            .optional_max_len("remarks", self.remarks.as_deref(), 2000)
            .nested("clients", &self.clients);
        if let Some(return_date) = self.return_date {
            v.not_before("return_date", self.travel_date, return_date);
        }
        let mut seen = std::collections::HashSet::new();
        for (i, c) in self.clients.iter().enumerate() {
            if !seen.insert(c.client_id.as_str()) {
                v.error(&format!("clients[{i}].client_id"), "client is already in the group");
            }
        }
        v.finish()
    }
}

impl GroupBookingInput {
    pub fn client_ids(&self) -> Result<Vec<ObjectId>, AppError> {
        self.clients.iter().map(|c| parse_id(&c.client_id)).collect()
    }

    pub fn total(&self) -> f64 {
        round2(self.clients.iter().map(|c| c.amount).sum())
    }

    pub fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "branch_id": parse_optional_id(self.branch_id.as_deref())?,
            "group_name": self.group_name.trim(),
            "sector_id": parse_optional_id(self.sector_id.as_deref())?,
            "destination": self.destination.trim(),
            "travel_date": self.travel_date.to_string(),
            "return_date": self.return_date.map(|d| d.to_string()),
            "total_amount": self.total(),
            "status": self.status.as_str(),
            "remarks": self.remarks.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_clients_are_rejected() {
        let client = ObjectId::new().to_hex();
        let input: GroupBookingInput = serde_json::from_value(serde_json::json!({
            "group_name": "Rotary Club Bhutan",
            "destination": "Paro",
            "travel_date": "2027-04-02",
            "clients": [
                { "client_id": client, "amount": 42000.0 },
                { "client_id": client, "amount": 42000.0 }
            ]
        }))
        .unwrap();
        match input.validate() {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors[0].field, "clients[1].client_id")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn total_sums_client_shares() {
        let input: GroupBookingInput = serde_json::from_value(serde_json::json!({
            "group_name": "College trip",
            "destination": "Manali",
            "travel_date": "2027-01-10",
            "clients": [
                { "client_id": ObjectId::new().to_hex(), "amount": 15999.99, "pax": 2 },
                { "client_id": ObjectId::new().to_hex(), "amount": 8000.01 }
            ]
        }))
        .unwrap();
        assert!(input.validate().is_ok());
        assert_eq!(input.total(), 24000.0);
        assert_eq!(input.client_ids().unwrap().len(), 2);
    }
}
