use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::booking::round2;
use super::common::{
    parse_id, parse_optional_id, serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex,
};
use super::hotel_booking::{nights, MealPlan, ReservationStatus};
use crate::db::children::ChildInput;
use crate::error::AppError;
use crate::validation::{Validate, Validator};

/// Chauffeured vehicle hire, with its day-by-day route and the hotels
/// booked along the way.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VehicleBooking {
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
    pub hrv_number: String,
    pub vehicle_type: String,
    #[serde(default)]
    pub vehicle_number: Option<String>,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub driver_phone: Option<String>,
    pub pickup_date: NaiveDate,
    pub drop_date: NaiveDate,
    pub pickup_point: String,
    #[serde(default)]
    pub drop_point: Option<String>,
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

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VehicleItinerary {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub vehicle_booking_id: ObjectId,
    pub day: i32,
    pub date: NaiveDate,
    pub from_place: String,
    pub to_place: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct VehicleHotelBooking {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub vehicle_booking_id: ObjectId,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub hotel_id: ObjectId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub rooms: i32,
    #[serde(default)]
    pub room_type: Option<String>,
    pub meal_plan: MealPlan,
}

#[derive(Serialize, Debug)]
pub struct VehicleBookingDetail {
    #[serde(flatten)]
    pub booking: VehicleBooking,
    pub itineraries: Vec<VehicleItinerary>,
    pub hotels: Vec<VehicleHotelBooking>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ItineraryInput {
    pub id: Option<String>,
    pub day: i32,
    pub date: NaiveDate,
    pub from_place: String,
    pub to_place: String,
    pub description: Option<String>,
}

impl Validate for ItineraryInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .optional_id("id", self.id.as_deref())
            .at_least("day", i64::from(self.day), 1)
            .text("from_place", &self.from_place, 100)
            .text("to_place", &self.to_place, 100)
            .optional_max_len("description", self.description.as_deref(), 1000)
            .finish()
    }
}

impl ChildInput for ItineraryInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "day": self.day,
            "date": self.date.to_string(),
            "from_place": self.from_place.trim(),
            "to_place": self.to_place.trim(),
            "description": self.description.clone(),
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct VehicleHotelInput {
    pub id: Option<String>,
    pub hotel_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default = "one")]
    pub rooms: i32,
    pub room_type: Option<String>,
    pub meal_plan: MealPlan,
}

fn one() -> i32 {
    1
}

impl Validate for VehicleHotelInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .optional_id("id", self.id.as_deref())
            .id("hotel_id", &self.hotel_id)
            .after("check_out", self.check_in, self.check_out)
            .at_least("rooms", i64::from(self.rooms), 1)
            .optional_max_len("room_type", self.room_type.as_deref(), 50)
            .finish()
    }
}

impl ChildInput for VehicleHotelInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "hotel_id": parse_id(&self.hotel_id)?,
            "check_in": self.check_in.to_string(),
            "check_out": self.check_out.to_string(),
            "nights": nights(self.check_in, self.check_out),
            "rooms": self.rooms,
            "room_type": self.room_type.clone(),
            "meal_plan": self.meal_plan.as_str(),
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct VehicleBookingInput {
    pub booking_id: Option<String>,
    pub client_id: String,
    pub vehicle_type: String,
    pub vehicle_number: Option<String>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub pickup_date: NaiveDate,
    pub drop_date: NaiveDate,
    pub pickup_point: String,
    pub drop_point: Option<String>,
    pub passengers: i32,
    pub amount: f64,
    #[serde(default)]
    pub status: ReservationStatus,
    pub remarks: Option<String>,
    #[serde(default)]
    pub itineraries: Vec<ItineraryInput>,
    #[serde(default)]
    pub hotels: Vec<VehicleHotelInput>,
}

impl Validate for VehicleBookingInput {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.optional_id("booking_id", self.booking_id.as_deref())
            .id("client_id", &self.client_id)
            .text("vehicle_type", &self.vehicle_type, 50)
            .optional_max_len("vehicle_number", self.vehicle_number.as_deref(), 20)
            .optional_max_len("driver_name", self.driver_name.as_deref(), 100)
            .optional_phone("driver_phone", self.driver_phone.as_deref())
            .not_before("drop_date", self.pickup_date, self.drop_date)
            .text("pickup_point", &self.pickup_point, 200)
            .optional_max_len("drop_point", self.drop_point.as_deref(), 200)
            .at_least("passengers", i64::from(self.passengers), 1)
            .non_negative("amount", self.amount)
            .optional_max_len("remarks", self.remarks.as_deref(), 2000)
            .nested("itineraries", &self.itineraries)
            .nested("hotels", &self.hotels);

        let trip = self.pickup_date..=self.drop_date;
        for (i, leg) in self.itineraries.iter().enumerate() {
            if !trip.contains(&leg.date) {
                v.error(&format!("itineraries[{i}].date"), "must fall within the hire period");
            }
        }
        for (i, stay) in self.hotels.iter().enumerate() {
            if stay.check_in < self.pickup_date || stay.check_out > self.drop_date {
                v.error(&format!("hotels[{i}].check_in"), "stay must fall within the hire period");
            }
        }
        v.finish()
    }
}

impl VehicleBookingInput {
    pub fn hotel_ids(&self) -> Result<Vec<ObjectId>, AppError> {
        self.hotels.iter().map(|h| parse_id(&h.hotel_id)).collect()
    }

    pub fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "booking_id": parse_optional_id(self.booking_id.as_deref())?,
            "client_id": parse_id(&self.client_id)?,
            "vehicle_type": self.vehicle_type.trim(),
            "vehicle_number": self.vehicle_number.as_ref().map(|n| n.trim().to_uppercase()),
            "driver_name": self.driver_name.clone(),
            "driver_phone": self.driver_phone.clone(),
            "pickup_date": self.pickup_date.to_string(),
            "drop_date": self.drop_date.to_string(),
            "pickup_point": self.pickup_point.trim(),
            "drop_point": self.drop_point.clone(),
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

    fn input() -> VehicleBookingInput {
        serde_json::from_value(serde_json::json!({
            "client_id": ObjectId::new().to_hex(),
            "vehicle_type": "Innova Crysta",
            "pickup_date": "2027-02-10",
            "drop_date": "2027-02-14",
            "pickup_point": "Bagdogra Airport",
            "passengers": 4,
            "amount": 28000,
            "itineraries": [
                { "day": 1, "date": "2027-02-10", "from_place": "Bagdogra", "to_place": "Gangtok" },
                { "day": 4, "date": "2027-02-13", "from_place": "Gangtok", "to_place": "Darjeeling" }
            ],
            "hotels": [
                {
                    "hotel_id": ObjectId::new().to_hex(),
                    "check_in": "2027-02-10",
                    "check_out": "2027-02-13",
                    "meal_plan": "CP"
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn valid_trip() {
        let trip = input();
        assert!(trip.validate().is_ok());
        assert_eq!(trip.hotel_ids().unwrap().len(), 1);
        let stay = trip.hotels[0].to_document().unwrap();
        assert_eq!(stay.get_i64("nights").unwrap(), 3);
    }

    #[test]
    fn legs_outside_hire_period_are_rejected() {
        let mut trip = input();
        trip.itineraries[1].date = NaiveDate::from_ymd_opt(2027, 2, 20).unwrap();
        trip.hotels[0].check_out = NaiveDate::from_ymd_opt(2027, 2, 16).unwrap();
        match trip.validate() {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, ["itineraries[1].date", "hotels[0].check_in"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn nested_leg_errors_are_prefixed() {
        let mut trip = input();
        trip.itineraries[0].from_place = String::new();
        match trip.validate() {
            Err(AppError::Validation(errors)) => {
                assert_eq!(errors[0].field, "itineraries[0].from_place")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
