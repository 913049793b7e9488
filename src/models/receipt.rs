use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::booking::round2;
use super::common::{
    parse_id, parse_optional_id, serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex,
};
use crate::error::AppError;
use crate::validation::{Validate, Validator};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Cheque,
    BankTransfer,
    Card,
    Upi,
}

impl PaymentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMode::Cash => "cash",
            PaymentMode::Cheque => "cheque",
            PaymentMode::BankTransfer => "bank_transfer",
            PaymentMode::Card => "card",
            PaymentMode::Upi => "upi",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PaymentMode::Cash => "Cash",
            PaymentMode::Cheque => "Cheque",
            PaymentMode::BankTransfer => "Bank transfer",
            PaymentMode::Card => "Card",
            PaymentMode::Upi => "UPI",
        }
    }

    /// Modes that go through the agency's bank and need a reference.
    pub fn is_banked(self) -> bool {
        matches!(self, PaymentMode::Cheque | PaymentMode::BankTransfer)
    }
}

/// Money received against a booking.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BookingReceipt {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    pub receipt_number: String,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub booking_id: ObjectId,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub client_id: ObjectId,
    pub receipt_date: NaiveDate,
    pub amount: f64,
    pub payment_mode: PaymentMode,
    #[serde(default, serialize_with = "serialize_id_as_hex")]
    pub bank_id: Option<ObjectId>,
    #[serde(default)]
    pub reference: Option<String>,
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
pub struct ReceiptInput {
    pub booking_id: String,
    pub receipt_date: NaiveDate,
    pub amount: f64,
    pub payment_mode: PaymentMode,
    pub bank_id: Option<String>,
    pub reference: Option<String>,
    pub remarks: Option<String>,
}

impl Validate for ReceiptInput {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.id("booking_id", &self.booking_id)
            .positive("amount", self.amount)
            .optional_id("bank_id", self.bank_id.as_deref())
            .optional_max_len("reference", self.reference.as_deref(), 50)
            .optional_max_len("remarks", self.remarks.as_deref(), 1000);
        if self.payment_mode.is_banked() {
            if self.bank_id.is_none() {
                v.error("bank_id", "is required for cheque and bank transfer");
            }
            if self.reference.as_deref().map_or(true, |r| r.trim().is_empty()) {
                v.error("reference", "is required for cheque and bank transfer");
            }
        }
        v.finish()
    }
}

impl ReceiptInput {
    /// Editable fields. The booking and client are fixed once the receipt exists.
    pub fn to_document(&self) -> Result<Document, AppError> {
        Ok(doc! {
            "receipt_date": self.receipt_date.to_string(),
            "amount": round2(self.amount),
            "payment_mode": self.payment_mode.as_str(),
            "bank_id": parse_optional_id(self.bank_id.as_deref())?,
            "reference": self.reference.as_ref().map(|r| r.trim().to_string()),
            "remarks": self.remarks.clone(),
        })
    }

    pub fn booking(&self) -> Result<ObjectId, AppError> {
        parse_id(&self.booking_id)
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct ReceiptFilter {
    pub booking_id: Option<String>,
    pub client_id: Option<String>,
    pub payment_mode: Option<PaymentMode>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(mode: &str) -> ReceiptInput {
        serde_json::from_value(serde_json::json!({
            "booking_id": ObjectId::new().to_hex(),
            "receipt_date": "2026-10-19",
            "amount": 10000.0,
            "payment_mode": mode
        }))
        .unwrap()
    }

    #[test]
    fn cash_needs_no_bank() {
        assert!(input("cash").validate().is_ok());
        assert!(input("upi").validate().is_ok());
    }

    #[test]
    fn cheque_needs_bank_and_reference() {
        match input("cheque").validate() {
            Err(AppError::Validation(errors)) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, ["bank_id", "reference"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let mut receipt = input("bank_transfer");
        receipt.bank_id = Some(ObjectId::new().to_hex());
        receipt.reference = Some("UTR0099812".into());
        assert!(receipt.validate().is_ok());
    }

    #[test]
    fn zero_amount_is_rejected() {
        let mut receipt = input("cash");
        receipt.amount = 0.0;
        assert!(receipt.validate().is_err());
    }
}
