//! Sequential document numbers.
//!
//! Each (owner, kind, period) has a counter document in `counters`. A number is
//! taken with an atomic `$inc` upsert executed inside the caller's transaction,
//! so the increment commits or rolls back together with the record that carries
//! the number. Concurrent allocations on the same counter conflict at the
//! storage layer and one of them is retried by
//! [`MongoDB::with_transaction`](super::MongoDB::with_transaction); numbers are
//! unique but may have gaps.

use chrono::{Datelike, NaiveDate};
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    ClientSession,
};

use super::{collections, MongoDB};
use crate::error::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Booking,
    GroupBooking,
    /// Hotel/vehicle reservation voucher. Hotel and vehicle bookings share one sequence.
    Hrv,
    Receipt,
    Invoice,
    SubscriptionInvoice,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Period {
    Running,
    CalendarYear,
    FiscalYear,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Booking => "booking",
            DocumentKind::GroupBooking => "group_booking",
            DocumentKind::Hrv => "hrv",
            DocumentKind::Receipt => "receipt",
            DocumentKind::Invoice => "invoice",
            DocumentKind::SubscriptionInvoice => "subscription_invoice",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Booking => "BK",
            DocumentKind::GroupBooking => "GB",
            DocumentKind::Hrv => "HRV",
            DocumentKind::Receipt => "RCT",
            DocumentKind::Invoice => "INV",
            DocumentKind::SubscriptionInvoice => "SUB",
        }
    }

    fn width(self) -> usize {
        match self {
            DocumentKind::Booking | DocumentKind::GroupBooking => 5,
            DocumentKind::Hrv => 6,
            DocumentKind::Receipt | DocumentKind::Invoice | DocumentKind::SubscriptionInvoice => 4,
        }
    }

    fn period(self) -> Period {
        match self {
            DocumentKind::Booking | DocumentKind::GroupBooking => Period::CalendarYear,
            DocumentKind::Hrv => Period::Running,
            DocumentKind::Receipt | DocumentKind::Invoice | DocumentKind::SubscriptionInvoice => {
                Period::FiscalYear
            }
        }
    }
}

/// The period a document dated `date` is numbered in, e.g. `2026` or `2026-27`.
pub fn period_key(kind: DocumentKind, date: NaiveDate, fiscal_start_month: u32) -> Option<String> {
    match kind.period() {
        Period::Running => None,
        Period::CalendarYear => Some(date.year().to_string()),
        Period::FiscalYear => {
            let start = if date.month() >= fiscal_start_month {
                date.year()
            } else {
                date.year() - 1
            };
            if fiscal_start_month == 1 {
                Some(start.to_string())
            } else {
                Some(format!("{start}-{:02}", (start + 1) % 100))
            }
        }
    }
}

pub fn format_number(kind: DocumentKind, period: Option<&str>, sequence: i64) -> String {
    let width = kind.width();
    match period {
        Some(period) => format!("{}/{period}/{sequence:0width$}", kind.prefix()),
        None => format!("{}/{sequence:0width$}", kind.prefix()),
    }
}

pub fn counter_key(owner: Option<ObjectId>, kind: DocumentKind, period: Option<&str>) -> String {
    let owner = owner.map_or_else(|| "platform".to_string(), |id| id.to_hex());
    match period {
        Some(period) => format!("{owner}:{}:{period}", kind.as_str()),
        None => format!("{owner}:{}", kind.as_str()),
    }
}

#[derive(Clone, Copy, Debug)]
pub struct NumberGenerator {
    fiscal_start_month: u32,
}

impl NumberGenerator {
    pub fn new(fiscal_start_month: u32) -> Self {
        Self { fiscal_start_month }
    }

    /// Takes the next number for `owner` (an agency, or `None` for platform
    /// documents) within `session`'s transaction.
    pub async fn next(
        &self,
        db: &MongoDB,
        session: &mut ClientSession,
        owner: Option<ObjectId>,
        kind: DocumentKind,
        date: NaiveDate,
    ) -> Result<String, AppError> {
        let period = period_key(kind, date, self.fiscal_start_month);
        let key = counter_key(owner, kind, period.as_deref());

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        let counter = db
            .documents(collections::COUNTERS)
            .find_one_and_update_with_session(
                doc! { "_id": key.as_str() },
                doc! {
                    "$inc": { "seq": 1_i64 },
                    "$setOnInsert": {
                        "owner": owner,
                        "kind": kind.as_str(),
                        "period": period.clone(),
                    },
                },
                options,
                session,
            )
            .await?
            .ok_or_else(|| AppError::Internal(format!("counter {key} was not returned")))?;

        let sequence = counter
            .get_i64("seq")
            .map_err(|e| AppError::Internal(format!("counter {key} is malformed: {e}")))?;
        Ok(format_number(kind, period.as_deref(), sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fiscal_year_rolls_over_in_start_month() {
        assert_eq!(
            period_key(DocumentKind::Invoice, date(2026, 3, 31), 4).as_deref(),
            Some("2025-26")
        );
        assert_eq!(
            period_key(DocumentKind::Invoice, date(2026, 4, 1), 4).as_deref(),
            Some("2026-27")
        );
        assert_eq!(
            period_key(DocumentKind::Receipt, date(2099, 12, 1), 4).as_deref(),
            Some("2099-00")
        );
    }

    #[test]
    fn january_fiscal_year_is_calendar_year() {
        assert_eq!(
            period_key(DocumentKind::Invoice, date(2026, 6, 1), 1).as_deref(),
            Some("2026")
        );
    }

    #[test]
    fn bookings_reset_each_calendar_year() {
        assert_eq!(
            period_key(DocumentKind::Booking, date(2026, 12, 31), 4).as_deref(),
            Some("2026")
        );
        assert_eq!(period_key(DocumentKind::Hrv, date(2026, 12, 31), 4), None);
    }

    #[test]
    fn formats_with_prefix_period_and_padding() {
        assert_eq!(
            format_number(DocumentKind::Booking, Some("2026"), 7),
            "BK/2026/00007"
        );
        assert_eq!(format_number(DocumentKind::Hrv, None, 42), "HRV/000042");
        assert_eq!(
            format_number(DocumentKind::Invoice, Some("2026-27"), 12345),
            "INV/2026-27/12345"
        );
    }

    #[test]
    fn counter_keys_separate_owners_kinds_and_periods() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let keys = [
            counter_key(Some(a), DocumentKind::Invoice, Some("2026-27")),
            counter_key(Some(b), DocumentKind::Invoice, Some("2026-27")),
            counter_key(Some(a), DocumentKind::Receipt, Some("2026-27")),
            counter_key(Some(a), DocumentKind::Invoice, Some("2027-28")),
            counter_key(None, DocumentKind::SubscriptionInvoice, Some("2026-27")),
        ];
        for (i, k) in keys.iter().enumerate() {
            for other in &keys[i + 1..] {
                assert_ne!(k, other);
            }
        }
        assert_eq!(
            counter_key(None, DocumentKind::SubscriptionInvoice, Some("2026-27")),
            "platform:subscription_invoice:2026-27"
        );
    }
}
