use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::booking::round2;
use super::common::{
    parse_id, parse_optional_id, serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex,
};
use crate::error::AppError;
use crate::validation::{Validate, Validator};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MealPlan {
    /// Room only.
    EP,
    /// Breakfast.
    CP,
    /// Breakfast and one meal.
    MAP,
    /// All meals.
    AP,
}

impl MealPlan {
    pub fn as_str(self) -> &'static str {
        match self {
            MealPlan::EP => "EP",
            MealPlan::CP => "CP",
            MealPlan::MAP => "MAP",
            MealPlan::AP => "AP",
        }
    }
}

pub fn nights(check_in: NaiveDate, check_out: NaiveDate) -> i64 {
    (check_out - check_in).num_days()
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HotelBooking {
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
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub hotel_id: ObjectId,
    pub hrv_number: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: i64,
    pub rooms: i32,
    #[serde(default)]
    pub room_type: Option<String>,
    pub meal_plan: MealPlan,
    pub adults: i32,
    #[serde(default)]
    pub children: i32,
    pub amount: f64,
    #[serde(default)]
    pub confirmation_number: Option<String>,
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
pub struct HotelBookingInput {
    pub booking_id: Option<String>,
    pub client_id: String,
    pub hotel_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default = "one")]
    pub rooms: i32,
    pub room_type: Option<String>,
    pub meal_plan: MealPlan,
    pub adults: i32,
    #[serde(default)]
    pub children: i32,
    pub amount: f64,
    pub confirmation_number: Option<String>,
    #[serde(default)]
    pub status: ReservationStatus,
    pub remarks: Option<String>,
}

fn one() -> i32 {
    1
}

impl Validate for HotelBookingInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .optional_id("booking_id", self.booking_id.as_deref())
            .id("client_id", &self.client_id)
            .id("hotel_id", &self.hotel_id)
            .after("check_out", self.check_in, self.check_out)
            .at_least("rooms", i64::from(self.rooms), 1)
            .optional_max_len("room_type", self.room_type.as_deref(), 50)
            .at_least("adults", i64::from(self.adults), 1)
            .at_least("children", i64::from(self.children), 0)
            .non_negative("amount", self.amount)
            .optional_max_len("confirmation_number", self.confirmation_number.as_deref(), 50)
            .optional_max_len("remarks", self.remarks.as_deref(), 2000)
            .finish()
    }
}

impl HotelBookingInput {
    pub fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "booking_id": parse_optional_id(self.booking_id.as_deref())?,
            "client_id": parse_id(&self.client_id)?,
            "hotel_id": parse_id(&self.hotel_id)?,
            "check_in": self.check_in.to_string(),
            "check_out": self.check_out.to_string(),
            "nights": nights(self.check_in, self.check_out),
            "rooms": self.rooms,
            "room_type": self.room_type.clone(),
            "meal_plan": self.meal_plan.as_str(),
            "adults": self.adults,
            "children": self.children,
            "amount": round2(self.amount),
            "confirmation_number": self.confirmation_number.clone(),
            "status": self.status.as_str(),
            "remarks": self.remarks.clone(),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub client_id: Option<String>,
    pub booking_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
