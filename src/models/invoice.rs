use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use serde::{Deserialize, Serialize};

use super::booking::round2;
use super::common::{parse_id, serialize_datetime, serialize_id_as_hex, serialize_oid_as_hex};
use crate::error::AppError;
use crate::validation::{Validate, Validator};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: i32,
    pub rate: f64,
    pub tax_percent: f64,
    pub amount: f64,
    pub tax: f64,
}

/// Tax invoice raised against a booking. Line items are embedded.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Invoice {
    #[serde(
        rename(serialize = "id", deserialize = "_id"),
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_id_as_hex"
    )]
    pub id: Option<ObjectId>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub agency_id: ObjectId,
    pub invoice_number: String,
    pub invoice_date: NaiveDate,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub booking_id: ObjectId,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub client_id: ObjectId,
    pub items: Vec<InvoiceItem>,
    pub subtotal: f64,
    pub tax_total: f64,
    pub total: f64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(serialize_with = "serialize_oid_as_hex")]
    pub created_by: ObjectId,
    #[serde(serialize_with = "serialize_datetime")]
    pub created_at: DateTime,
    #[serde(serialize_with = "serialize_datetime")]
    pub updated_at: DateTime,
}

#[derive(Deserialize, Debug, Clone)]
pub struct InvoiceItemInput {
    pub description: String,
    #[serde(default = "one")]
    pub quantity: i32,
    pub rate: f64,
    #[serde(default)]
    pub tax_percent: f64,
}

fn one() -> i32 {
    1
}

impl Validate for InvoiceItemInput {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .text("description", &self.description, 300)
            .at_least("quantity", i64::from(self.quantity), 1)
            .non_negative("rate", self.rate)
            .range("tax_percent", self.tax_percent, 0.0, 100.0)
            .finish()
    }
}

impl InvoiceItemInput {
    pub fn priced(&self) -> InvoiceItem {
        let amount = round2(f64::from(self.quantity) * self.rate);
        InvoiceItem {
            description: self.description.trim().to_string(),
            quantity: self.quantity,
            rate: self.rate,
            tax_percent: self.tax_percent,
            amount,
            tax: round2(amount * self.tax_percent / 100.0),
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Totals {
    pub subtotal: f64,
    pub tax_total: f64,
    pub total: f64,
}

pub fn totals(items: &[InvoiceItem]) -> Totals {
    let subtotal = round2(items.iter().map(|i| i.amount).sum());
    let tax_total = round2(items.iter().map(|i| i.tax).sum());
    Totals {
        subtotal,
        tax_total,
        total: round2(subtotal + tax_total),
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct InvoiceInput {
    pub booking_id: String,
    pub invoice_date: NaiveDate,
    pub items: Vec<InvoiceItemInput>,
    pub notes: Option<String>,
}

impl Validate for InvoiceInput {
    fn validate(&self) -> Result<(), AppError> {
        let mut v = Validator::new();
        v.id("booking_id", &self.booking_id)
            .optional_max_len("notes", self.notes.as_deref(), 2000)
            .nested("items", &self.items);
        if self.items.is_empty() {
            v.error("items", "at least one line item is required");
        }
        v.finish()
    }
}

impl InvoiceInput {
    pub fn booking(&self) -> Result<ObjectId, AppError> {
        parse_id(&self.booking_id)
    }

    /// Priced lines and totals; the caller adds identity, numbering and audit fields.
    pub fn to_document(&self) -> Document {
        let items: Vec<InvoiceItem> = self.items.iter().map(InvoiceItemInput::priced).collect();
        let sums = totals(&items);
        let lines: Vec<Document> = items
            .iter()
            .map(|i| {
                doc! {
                    "description": i.description.as_str(),
                    "quantity": i.quantity,
                    "rate": i.rate,
                    "tax_percent": i.tax_percent,
                    "amount": i.amount,
                    "tax": i.tax,
                }
            })
            .collect();
        doc! {
            "invoice_date": self.invoice_date.to_string(),
            "items": lines,
            "subtotal": sums.subtotal,
            "tax_total": sums.tax_total,
            "total": sums.total,
            "notes": self.notes.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct InvoiceFilter {
    pub booking_id: Option<String>,
    pub client_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> InvoiceInput {
        serde_json::from_value(serde_json::json!({
            "booking_id": ObjectId::new().to_hex(),
            "invoice_date": "2026-10-19",
            "items": [
                { "description": "Tour package", "quantity": 2, "rate": 18500.0, "tax_percent": 5.0 },
                { "description": "Visa assistance", "rate": 2500.0, "tax_percent": 18.0 }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn totals_include_per_line_tax() {
        let invoice = input();
        assert!(invoice.validate().is_ok());
        let items: Vec<_> = invoice.items.iter().map(InvoiceItemInput::priced).collect();
        assert_eq!(items[0].amount, 37000.0);
        assert_eq!(items[0].tax, 1850.0);
        assert_eq!(items[1].tax, 450.0);
        assert_eq!(
            totals(&items),
            Totals {
                subtotal: 39500.0,
                tax_total: 2300.0,
                total: 41800.0
            }
        );

        let doc = invoice.to_document();
        assert_eq!(doc.get_f64("total").unwrap(), 41800.0);
        assert_eq!(doc.get_array("items").unwrap().len(), 2);
    }

    #[test]
    fn empty_invoice_is_rejected() {
        let mut invoice = input();
        invoice.items.clear();
        assert!(invoice.validate().is_err());
    }

    #[test]
    fn tax_over_hundred_percent_is_rejected() {
        let mut invoice = input();
        invoice.items[1].tax_percent = 118.0;
        match invoice.validate() {
            Err(AppError::Validation(errors)) => assert_eq!(errors[0].field, "items[1].tax_percent"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
