use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::common::{
    parse_id, parse_optional_id, serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex,
};
use crate::db::children::ChildInput;
use crate::error::AppError;
use crate::validation::{Validate, Validator};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Enquiry,
    Quoted,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Enquiry => "enquiry",
            BookingStatus::Quoted => "quoted",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled bookings are closed; nothing moves them again.
    pub fn can_become(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (Completed | Cancelled, _) => false,
            (Enquiry | Quoted, Completed) => false,
            _ => true,
        }
    }
}

/// Tour enquiry that becomes a booking once confirmed.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Booking {
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
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub client_id: ObjectId,
    pub booking_number: String,
    pub enquiry_date: NaiveDate,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub sector_id: Option<ObjectId>,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub fair_id: Option<ObjectId>,
    pub destination: String,
    pub travel_date: NaiveDate,
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    pub adults: i32,
    #[serde(default)]
    pub children: i32,
    #[serde(default)]
    pub infants: i32,
    pub total_amount: f64,
    pub status: BookingStatus,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub assigned_to: Option<ObjectId>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub created_by: ObjectId,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

/// Priced line of a tour booking.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TourBookingDetail {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub booking_id: ObjectId,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub service_id: Option<ObjectId>,
    pub description: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub quantity: i32,
    pub rate: f64,
    pub amount: f64,
}

#[derive(Serialize, Debug)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub details: Vec<TourBookingDetail>,
    pub paid_amount: f64,
    pub balance: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TourDetailInput {
    pub id: Option<String>,
    pub service_id: Option<String>,
    pub description: String,
    pub date: Option<NaiveDate>,
    #[serde(default = "one")]
    pub quantity: i32,
    pub rate: f64,
}

fn one() -> i32 {
    1
}

impl TourDetailInput {
    pub fn amount(&self) -> f64 {
        round2(f64::from(self.quantity) * self.rate)
    }
}

impl Validate for TourDetailInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .optional_id("id", self.id.as_deref())
            .optional_id("service_id", self.service_id.as_deref())
            .text("description", &self.description, 300)
            .at_least("quantity", i64::from(self.quantity), 1)
            .non_negative("rate", self.rate)
            .finish()
    }
}

impl ChildInput for TourDetailInput {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "service_id": parse_optional_id(self.service_id.as_deref())?,
            "description": self.description.trim(),
            "date": self.date.map(|d| d.to_string()),
            "quantity": self.quantity,
            "rate": self.rate,
            "amount": self.amount(),
        })
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct BookingInput {
    pub client_id: String,
    pub branch_id: Option<String>,
    pub enquiry_date: Option<NaiveDate>,
    pub sector_id: Option<String>,
    pub fair_id: Option<String>,
    pub destination: String,
    pub travel_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub adults: i32,
    #[serde(default)]
    pub children: i32,
    #[serde(default)]
    pub infants: i32,
    /// Used when no detail lines are given; otherwise the lines are summed.
    #[serde(default)]
    pub total_amount: f64,
    pub source: Option<String>,
    pub assigned_to: Option<String>,
    pub remarks: Option<String>,
    #[serde(default)]
    pub details: Vec<TourDetailInput>,
}

impl Validate for BookingInput {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.id("client_id", &self.client_id)
            .optional_id("branch_id", self.branch_id.as_deref())
            .optional_id("sector_id", self.sector_id.as_deref())
            .optional_id("fair_id", self.fair_id.as_deref())
            .optional_id("assigned_to", self.assigned_to.as_deref())
            .text("destination", &self.destination, 200)
            .at_least("adults", i64::from(self.adults), 1)
            .at_least("children", i64::from(self.children), 0)
            .at_least("infants", i64::from(self.infants), 0)
            .non_negative("total_amount", self.total_amount)
            .optional_max_len("source", self.source.as_deref(), 100)
            .optional_max_len("remarks", self.remarks.as_deref(), 2000)
            .nested("details", &self.details);
        if let Some(return_date) = self.return_date {
            v.not_before("return_date", self.travel_date, return_date);
        }
        if let Some(enquiry_date) = self.enquiry_date {
            v.not_before("travel_date", enquiry_date, self.travel_date);
        }
        v.finish()
    }
}

impl BookingInput {
    /// Services named by the detail lines.
    pub fn service_ids(&self) -> Result<Vec<ObjectId>, AppError> {
        self.details
            .iter()
            .filter_map(|d| d.service_id.as_deref())
            .map(parse_id)
            .collect()
    }

    pub fn total(&self) -> f64 {
        if self.details.is_empty() {
            round2(self.total_amount)
        } else {
            round2(self.details.iter().map(TourDetailInput::amount).sum())
        }
    }

    /// Fields editable on both create and update.
    pub fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "client_id": parse_id(&self.client_id)?,
            "branch_id": parse_optional_id(self.branch_id.as_deref())?,
            "sector_id": parse_optional_id(self.sector_id.as_deref())?,
            "fair_id": parse_optional_id(self.fair_id.as_deref())?,
            "destination": self.destination.trim(),
            "travel_date": self.travel_date.to_string(),
            "return_date": self.return_date.map(|d| d.to_string()),
            "adults": self.adults,
            "children": self.children,
            "infants": self.infants,
            "total_amount": self.total(),
            "source": self.source.clone(),
            "assigned_to": parse_optional_id(self.assigned_to.as_deref())?,
            "remarks": self.remarks.clone(),
        })
    }
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct StatusUpdate {
    pub status: BookingStatus,
}

#[derive(Deserialize, Debug, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub client_id: Option<String>,
    pub branch_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStatus {
    #[default]
    Pending,
    Done,
}

impl FollowUpStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            FollowUpStatus::Pending => "pending",
            FollowUpStatus::Done => "done",
        }
    }
}

/// Sales follow-up note on an enquiry.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FollowUp {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub booking_id: ObjectId,
    pub follow_up_date: NaiveDate,
    pub remark: String,
    #[serde(default)]
    pub next_follow_up: Option<NaiveDate>,
    pub status: FollowUpStatus,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub created_by: ObjectId,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FollowUpInput {
    pub follow_up_date: NaiveDate,
    pub remark: String,
    pub next_follow_up: Option<NaiveDate>,
    #[serde(default)]
    pub status: FollowUpStatus,
}

impl Validate for FollowUpInput {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.text("remark", &self.remark, 2000);
        if let Some(next) = self.next_follow_up {
            v.not_before("next_follow_up", self.follow_up_date, next);
        }
        v.finish()
    }
}

impl FollowUpInput {
    pub fn to_document(&self) -> Document {
        doc! {
            "follow_up_date": self.follow_up_date.to_string(),
            "remark": self.remark.trim(),
            "next_follow_up": self.next_follow_up.map(|d| d.to_string()),
            "status": self.status.as_str(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct DueQuery {
    pub date: Option<NaiveDate>,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking_input() -> BookingInput {
        serde_json::from_value(serde_json::json!({
            "client_id": ObjectId::new().to_hex(),
            "destination": "Andaman",
            "travel_date": "2026-12-20",
            "return_date": "2026-12-27",
            "adults": 2,
            "total_amount": 50000.0,
            "details": [
                { "description": "Havelock resort, 4 nights", "quantity": 4, "rate": 8500.0 },
                { "description": "Ferry", "rate": 2400.5 }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn total_prefers_detail_lines() {
        let input = booking_input();
        assert!(input.validate().is_ok());
        assert_eq!(input.total(), 36400.5);

        let mut bare = booking_input();
        bare.details.clear();
        assert_eq!(bare.total(), 50000.0);
    }

    #[test]
    fn service_ids_come_from_detail_lines() {
        let mut input = booking_input();
        assert!(input.service_ids().unwrap().is_empty());

        let service = ObjectId::new();
        input.details[1].service_id = Some(service.to_hex());
        assert_eq!(input.service_ids().unwrap(), vec![service]);
    }

    #[test]
    fn return_before_travel_is_rejected() {
        let mut input = booking_input();
        input.return_date = NaiveDate::from_ymd_opt(2026, 12, 1);
        assert!(input.validate().is_err());
    }

    #[test]
    fn closed_bookings_stay_closed() {
        use BookingStatus::*;
        assert!(Enquiry.can_become(Confirmed));
        assert!(Confirmed.can_become(Completed));
        assert!(Confirmed.can_become(Cancelled));
        assert!(!Enquiry.can_become(Completed));
        assert!(!Cancelled.can_become(Confirmed));
        assert!(!Completed.can_become(Enquiry));
        assert!(Cancelled.can_become(Cancelled));
    }

    #[test]
    fn status_round_trips_as_snake_case() {
        let s: StatusUpdate = serde_json::from_str(r#"{"status":"confirmed"}"#).unwrap();
        assert_eq!(s.status, BookingStatus::Confirmed);
        assert_eq!(s.status.as_str(), "confirmed");
    }

    #[test]
    fn follow_up_next_date_not_in_past() {
        let input = FollowUpInput {
            follow_up_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            remark: "Called, wants quote".into(),
            next_follow_up: NaiveDate::from_ymd_opt(2026, 10, 18),
            status: FollowUpStatus::Pending,
        };
        assert!(input.validate().is_err());
    }
}
