use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::booking::round2;
use super::common::{
    parse_id, parse_optional_id, serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex,
};
use super::hotel_booking::ReservationStatus;
use crate::error::AppError;
use crate::validation::{Validate, Validator};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TravelMode {
    Flight,
    Train,
    Bus,
    Cruise,
}

impl TravelMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TravelMode::Flight => "flight",
            TravelMode::Train => "train",
            TravelMode::Bus => "bus",
            TravelMode::Cruise => "cruise",
        }
    }
}

/// Ticket for one leg of travel: flight, train, bus or cruise.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct JourneyBooking {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub booking_id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub client_id: ObjectId,
    pub mode: TravelMode,
    pub from_place: String,
    pub to_place: String,
    pub journey_date: NaiveDate,
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub arrival_time: Option<String>,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub service_number: Option<String>,
    #[serde(default)]
    pub pnr: Option<String>,
    #[serde(default)]
    pub travel_class: Option<String>,
    pub passengers: i32,
    pub amount: f64,
    pub status: ReservationStatus,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub created_by: ObjectId,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct JourneyBookingInput {
    pub booking_id: Option<String>,
    pub client_id: String,
    pub mode: TravelMode,
    pub from_place: String,
    pub to_place: String,
    pub journey_date: NaiveDate,
    pub departure_time: Option<String>,
    pub arrival_time: Option<String>,
    pub carrier: Option<String>,
    pub service_number: Option<String>,
    pub pnr: Option<String>,
    pub travel_class: Option<String>,
    pub passengers: i32,
    pub amount: f64,
    #[serde(default)]
    pub status: ReservationStatus,
    pub remarks: Option<String>,
}

impl Validate for JourneyBookingInput {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.optional_id("booking_id", self.booking_id.as_deref())
            .id("client_id", &self.client_id)
            .text("from_place", &self.from_place, 100)
            .text("to_place", &self.to_place, 100)
            .optional_max_len("carrier", self.carrier.as_deref(), 100)
            .optional_max_len("service_number", self.service_number.as_deref(), 20)
            .optional_max_len("pnr", self.pnr.as_deref(), 20)
            .optional_max_len("travel_class", self.travel_class.as_deref(), 30)
            .at_least("passengers", i64::from(self.passengers), 1)
            .non_negative("amount", self.amount)
            .optional_max_len("remarks", self.remarks.as_deref(), 2000);
        for (field, time) in [
            ("departure_time", self.departure_time.as_deref()),
            ("arrival_time", self.arrival_time.as_deref()),
        ] {
            if let Some(t) = time.filter(|t| !t.is_empty()) {
                if chrono::NaiveTime::parse_from_str(t, "%H:%M").is_err() {
                    v.error(field, "must be HH:MM");
                }
            }
        }
        if self.from_place.trim().eq_ignore_ascii_case(self.to_place.trim()) {
            v.error("to_place", "must differ from from_place");
        }
        v.finish()
    }
}

impl JourneyBookingInput {
    pub fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "booking_id": parse_optional_id(self.booking_id.as_deref())?,
            "client_id": parse_id(&self.client_id)?,
            "mode": self.mode.as_str(),
            "from_place": self.from_place.trim(),
            "to_place": self.to_place.trim(),
            "journey_date": self.journey_date.to_string(),
            "departure_time": self.departure_time.clone(),
            "arrival_time": self.arrival_time.clone(),
            "carrier": self.carrier.clone(),
            "service_number": self.service_number.clone(),
            "pnr": self.pnr.as_ref().map(|p| p.trim().to_uppercase()),
            "travel_class": self.travel_class.clone(),
            "passengers": self.passengers,
            "amount": round2(self.amount),
            "status": self.status.as_str(),
            "remarks": self.remarks.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> JourneyBookingInput {
        serde_json::from_value(serde_json::json!({
            "client_id": ObjectId::new().to_hex(),
            "mode": "train",
            "from_place": "Mumbai",
            "to_place": "Goa",
            "journey_date": "2026-11-02",
            "departure_time": "23:05",
            "pnr": "ab12345678",
            "passengers": 3,
            "amount": 4350.0
        }))
        .unwrap()
    }

    #[test]
    fn valid_journey() {
        let journey = input();
        assert!(journey.validate().is_ok());
        let doc = journey.to_document().unwrap();
        assert_eq!(doc.get_str("mode").unwrap(), "train");
        assert_eq!(doc.get_str("pnr").unwrap(), "AB12345678");
    }

    #[test]
    fn rejects_bad_time_and_same_endpoints() {
        let mut journey = input();
        journey.departure_time = Some("11pm".into());
        journey.to_place = "mumbai".into();
        match journey.validate() {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert!(fields.contains(&"departure_time"));
                assert!(fields.contains(&"to_place"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
