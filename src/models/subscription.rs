use chrono::{Duration, NaiveDate};
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::common::{serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex};
use crate::error::AppError;
use crate::validation::{Validate, Validator};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

/// One paid period of platform usage for an agency.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Subscription {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub package_id: ObjectId,
    pub package_name: String,
    pub invoice_number: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub amount: f64,
    pub max_users: i64,
    pub max_branches: i64,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

impl Subscription {
    /// Stored status, with active periods that ended before `today` reported as expired.
    pub fn status_on(&self, today: NaiveDate) -> SubscriptionStatus {
        match self.status {
            SubscriptionStatus::Active if self.end_date < today => SubscriptionStatus::Expired,
            status => status,
        }
    }

    /// Package limit snapshotted at purchase, by field name.
    pub fn limit(&self, field: &str) -> Option<i64> {
        match field {
            "max_users" => Some(self.max_users),
            "max_branches" => Some(self.max_branches),
            _ => None,
        }
    }

    /// The row as reported on `today`: see [`Subscription::status_on`].
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        self.status = self.status_on(today);
        self
    }
}

/// Query conditions for subscriptions reporting `status` on `today`. Expiry
/// is never stored, so it is derived from `end_date`.
pub fn status_conditions(status: SubscriptionStatus, today: NaiveDate) -> Document {
    let today = today.to_string();
    match status {
        SubscriptionStatus::Active => doc! {
            "status": SubscriptionStatus::Active.as_str(),
            "end_date": { "$gte": today },
        },
        SubscriptionStatus::Expired => doc! {
            "status": SubscriptionStatus::Active.as_str(),
            "end_date": { "$lt": today },
        },
        SubscriptionStatus::Cancelled => doc! { "status": SubscriptionStatus::Cancelled.as_str() },
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct SubscribeRequest {
    pub package_id: String,
    pub payment_reference: Option<String>,
}

impl Validate for SubscribeRequest {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .id("package_id", &self.package_id)
            .optional_max_len("payment_reference", self.payment_reference.as_deref(), 100)
            .finish()
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct SubscriptionFilter {
    pub agency_id: Option<String>,
    pub status: Option<SubscriptionStatus>,
}

/// First and last day of a new period. Renewals start the day after the
/// latest active period ends; otherwise the period starts today.
pub fn compute_period(
    today: NaiveDate,
    current_end: Option<NaiveDate>,
    duration_days: i64,
) -> Result<(NaiveDate, NaiveDate), AppError> {
    if duration_days < 1 {
        return Err(AppError::BadRequest(
            "Package duration must be at least one day".into(),
        ));
    }
    let out_of_range = || AppError::BadRequest("Subscription period is out of range".into());
    let start = match current_end {
        Some(end) if end >= today => end.succ_opt().ok_or_else(out_of_range)?,
        _ => today,
    };
    let end = Duration::try_days(duration_days - 1)
        .and_then(|span| start.checked_add_signed(span))
        .ok_or_else(out_of_range)?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_subscription_starts_today() {
        let (start, end) = compute_period(date(2026, 10, 19), None, 365).unwrap();
        assert_eq!(start, date(2026, 10, 19));
        assert_eq!(end, date(2027, 10, 18));
    }

    #[test]
    fn renewal_follows_current_period() {
        let (start, end) = compute_period(date(2026, 10, 19), Some(date(2026, 12, 31)), 30).unwrap();
        assert_eq!(start, date(2027, 1, 1));
        assert_eq!(end, date(2027, 1, 30));
    }

    #[test]
    fn lapsed_period_is_ignored() {
        let (start, _) = compute_period(date(2026, 10, 19), Some(date(2026, 9, 1)), 30).unwrap();
        assert_eq!(start, date(2026, 10, 19));
    }

    #[test]
    fn expired_filter_looks_for_lapsed_active_rows() {
        let today = date(2026, 10, 19);
        assert_eq!(
            status_conditions(SubscriptionStatus::Expired, today),
            doc! { "status": "active", "end_date": { "$lt": "2026-10-19" } }
        );
        assert_eq!(
            status_conditions(SubscriptionStatus::Active, today),
            doc! { "status": "active", "end_date": { "$gte": "2026-10-19" } }
        );
        assert_eq!(
            status_conditions(SubscriptionStatus::Cancelled, today),
            doc! { "status": "cancelled" }
        );
    }

    #[test]
    fn zero_duration_is_rejected() {
        assert!(compute_period(date(2026, 10, 19), None, 0).is_err());
    }

    #[test]
    fn oversized_duration_is_rejected_not_panicking() {
        assert!(matches!(
            compute_period(date(2026, 10, 19), None, 100_000_000),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            compute_period(date(2026, 10, 19), None, i64::MAX),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn active_period_past_its_end_reads_as_expired() {
        let now = DateTime::now();
        let sub = Subscription {
            id: None,
            agency_id: ObjectId::new(),
            package_id: ObjectId::new(),
            package_name: "Starter".into(),
            invoice_number: "SUB/2026-27/0001".into(),
            start_date: date(2026, 4, 1),
            end_date: date(2026, 9, 30),
            amount: 4999.0,
            max_users: 5,
            max_branches: 1,
            status: SubscriptionStatus::Active,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(sub.status_on(date(2026, 9, 30)), SubscriptionStatus::Active);
        assert_eq!(sub.status_on(date(2026, 10, 1)), SubscriptionStatus::Expired);
        assert_eq!(sub.clone().as_of(date(2026, 10, 1)).status, SubscriptionStatus::Expired);
        assert_eq!(
            serde_json::to_value(sub.clone().as_of(date(2026, 10, 1))).unwrap()["status"],
            "expired"
        );
        assert_eq!(sub.limit("max_users"), Some(5));
        assert_eq!(sub.limit("max_hotels"), None);
    }
}
