use std::collections::HashMap;

use mongodb::bson::oid::ObjectId;

use super::layout::{format_amount, Column, Layout};
use crate::models::{
    agency::Agency,
    client::Client,
    hotel_booking::HotelBooking,
    invoice::Invoice,
    receipt::BookingReceipt,
    reference::{Bank, Hotel},
    subscription::Subscription,
    vehicle_booking::VehicleBookingDetail,
};

const PLATFORM_NAME: &str = "Travel Desk";

fn letterhead(layout: &mut Layout, agency: &Agency) {
    layout.heading(&agency.name, 14.0);
    if let Some(address) = agency.address.as_deref() {
        layout.line(address);
    }
    let mut contact = format!("Phone: {}  Email: {}", agency.phone, agency.email);
    if let Some(gst) = agency.gst_number.as_deref() {
        contact.push_str(&format!("  GSTIN: {gst}"));
    }
    layout.line(&contact);
    layout.space(4.0);
}

fn client_block(layout: &mut Layout, client: &Client) {
    layout.key_values(&[
        ("Client", client.name.clone()),
        ("Phone", client.phone.clone()),
        ("Email", client.email.clone().unwrap_or_default()),
        ("Address", client.address.clone().unwrap_or_default()),
    ]);
    layout.space(3.0);
}

fn opt(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

pub fn invoice(agency: &Agency, client: &Client, booking_number: &str, invoice: &Invoice) -> Layout {
    let mut layout = Layout::new(&format!("Invoice {}", invoice.invoice_number));
    letterhead(&mut layout, agency);
    layout.title_bar(
        "TAX INVOICE",
        &format!("{}  |  {}", invoice.invoice_number, invoice.invoice_date),
    );
    client_block(&mut layout, client);
    layout.key_values(&[("Booking", booking_number.to_string())]);
    layout.space(3.0);

    let rows: Vec<Vec<String>> = invoice
        .items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            vec![
                (i + 1).to_string(),
                item.description.clone(),
                item.quantity.to_string(),
                format_amount(item.rate),
                format!("{}%", item.tax_percent),
                format_amount(item.tax),
                format_amount(item.amount + item.tax),
            ]
        })
        .collect();
    layout.table(
        &[
            Column::left("#", 0.5),
            Column::left("Description", 4.0),
            Column::right("Qty", 0.8),
            Column::right("Rate", 1.6),
            Column::right("Tax %", 1.0),
            Column::right("Tax", 1.4),
            Column::right("Amount", 1.8),
        ],
        &rows,
    );
    layout.totals(&[
        ("Subtotal", format_amount(invoice.subtotal)),
        ("Tax", format_amount(invoice.tax_total)),
        ("Total", format_amount(invoice.total)),
    ]);
    if let Some(notes) = invoice.notes.as_deref() {
        layout.space(4.0);
        layout.line(notes);
    }
    layout
}

pub struct ReceiptContext<'a> {
    pub agency: &'a Agency,
    pub client: &'a Client,
    pub booking_number: &'a str,
    pub bank: Option<&'a Bank>,
    pub booking_total: f64,
    pub paid: f64,
}

pub fn receipt(ctx: &ReceiptContext, receipt: &BookingReceipt) -> Layout {
    let mut layout = Layout::new(&format!("Receipt {}", receipt.receipt_number));
    letterhead(&mut layout, ctx.agency);
    layout.title_bar(
        "PAYMENT RECEIPT",
        &format!("{}  |  {}", receipt.receipt_number, receipt.receipt_date),
    );
    client_block(&mut layout, ctx.client);
    layout.key_values(&[
        ("Booking", ctx.booking_number.to_string()),
        ("Amount received", format_amount(receipt.amount)),
        ("Payment mode", receipt.payment_mode.label().to_string()),
        ("Bank", ctx.bank.map(|b| b.name.clone()).unwrap_or_default()),
        ("Reference", opt(&receipt.reference)),
        ("Remarks", opt(&receipt.remarks)),
    ]);
    layout.space(4.0);
    layout.totals(&[
        ("Booking total", format_amount(ctx.booking_total)),
        ("Received to date", format_amount(ctx.paid)),
        ("Balance", format_amount(ctx.booking_total - ctx.paid)),
    ]);
    layout
}

pub fn hotel_voucher(
    agency: &Agency,
    client: &Client,
    hotel: &Hotel,
    booking: &HotelBooking,
) -> Layout {
    let mut layout = Layout::new(&format!("Hotel voucher {}", booking.hrv_number));
    letterhead(&mut layout, agency);
    layout.title_bar("HOTEL RESERVATION VOUCHER", &booking.hrv_number);
    layout.key_values(&[
        ("Hotel", hotel.name.clone()),
        ("Address", opt(&hotel.address)),
        ("Hotel phone", opt(&hotel.phone)),
        ("Confirmation", opt(&booking.confirmation_number)),
    ]);
    layout.space(3.0);
    layout.key_values(&[
        ("Guest", client.name.clone()),
        ("Guest phone", client.phone.clone()),
        ("Check-in", booking.check_in.to_string()),
        ("Check-out", booking.check_out.to_string()),
        ("Nights", booking.nights.to_string()),
        ("Rooms", booking.rooms.to_string()),
        ("Room type", opt(&booking.room_type)),
        ("Meal plan", booking.meal_plan.as_str().to_string()),
        (
            "Guests",
            format!("{} adult(s), {} child(ren)", booking.adults, booking.children),
        ),
        ("Remarks", opt(&booking.remarks)),
    ]);
    layout.space(6.0);
    layout.line("Please present this voucher at check-in.");
    layout
}

pub fn vehicle_voucher(
    agency: &Agency,
    client: &Client,
    detail: &VehicleBookingDetail,
    hotels: &HashMap<ObjectId, Hotel>,
) -> Layout {
    let booking = &detail.booking;
    let mut layout = Layout::new(&format!("Vehicle voucher {}", booking.hrv_number));
    letterhead(&mut layout, agency);
    layout.title_bar("VEHICLE RESERVATION VOUCHER", &booking.hrv_number);
    layout.key_values(&[
        ("Guest", client.name.clone()),
        ("Guest phone", client.phone.clone()),
        ("Vehicle", booking.vehicle_type.clone()),
        ("Vehicle number", opt(&booking.vehicle_number)),
        ("Driver", opt(&booking.driver_name)),
        ("Driver phone", opt(&booking.driver_phone)),
        ("Pickup", format!("{} at {}", booking.pickup_date, booking.pickup_point)),
        (
            "Drop",
            match booking.drop_point.as_deref() {
                Some(point) => format!("{} at {point}", booking.drop_date),
                None => booking.drop_date.to_string(),
            },
        ),
        ("Passengers", booking.passengers.to_string()),
    ]);
    layout.space(3.0);

    if !detail.itineraries.is_empty() {
        layout.heading("Itinerary", 12.0);
        let mut legs = detail.itineraries.clone();
        legs.sort_by_key(|leg| (leg.day, leg.date));
        let rows: Vec<Vec<String>> = legs
            .iter()
            .map(|leg| {
                vec![
                    leg.day.to_string(),
                    leg.date.to_string(),
                    format!("{} to {}", leg.from_place, leg.to_place),
                    opt(&leg.description),
                ]
            })
            .collect();
        layout.table(
            &[
                Column::left("Day", 0.6),
                Column::left("Date", 1.4),
                Column::left("Route", 3.0),
                Column::left("Notes", 3.0),
            ],
            &rows,
        );
    }

    if !detail.hotels.is_empty() {
        layout.heading("Hotels", 12.0);
        let rows: Vec<Vec<String>> = detail
            .hotels
            .iter()
            .map(|stay| {
                vec![
                    hotels
                        .get(&stay.hotel_id)
                        .map(|h| h.name.clone())
                        .unwrap_or_else(|| "-".to_string()),
                    stay.check_in.to_string(),
                    stay.check_out.to_string(),
                    stay.nights.to_string(),
                    stay.rooms.to_string(),
                    stay.meal_plan.as_str().to_string(),
                ]
            })
            .collect();
        layout.table(
            &[
                Column::left("Hotel", 3.0),
                Column::left("Check-in", 1.4),
                Column::left("Check-out", 1.4),
                Column::right("Nights", 0.8),
                Column::right("Rooms", 0.8),
                Column::left("Plan", 0.8),
            ],
            &rows,
        );
    }
    if let Some(remarks) = booking.remarks.as_deref() {
        layout.line(remarks);
    }
    layout
}

pub fn subscription_invoice(agency: &Agency, subscription: &Subscription) -> Layout {
    let mut layout = Layout::new(&format!("Invoice {}", subscription.invoice_number));
    layout.heading(PLATFORM_NAME, 14.0);
    layout.space(2.0);
    layout.title_bar(
        "SUBSCRIPTION INVOICE",
        &format!("{}  |  {}", subscription.invoice_number, subscription.start_date),
    );
    layout.key_values(&[
        ("Billed to", agency.name.clone()),
        ("Email", agency.email.clone()),
        ("Address", opt(&agency.address)),
        ("GSTIN", opt(&agency.gst_number)),
        ("Payment ref.", opt(&subscription.payment_reference)),
    ]);
    layout.space(3.0);
    layout.table(
        &[
            Column::left("Package", 3.0),
            Column::left("Period", 3.0),
            Column::right("Amount", 1.5),
        ],
        &[vec![
            subscription.package_name.clone(),
            format!("{} to {}", subscription.start_date, subscription.end_date),
            format_amount(subscription.amount),
        ]],
    );
    layout.totals(&[("Total", format_amount(subscription.amount))]);
    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::InvoiceItem;
    use crate::pdf::layout::Op;
    use chrono::NaiveDate;
    use mongodb::bson::DateTime;

    fn agency() -> Agency {
        Agency {
            id: Some(ObjectId::new()),
            name: "Sunrise Holidays".into(),
            email: "desk@sunrise.example".into(),
            phone: "9820012345".into(),
            address: Some("12 Marine Drive, Mumbai".into()),
            gst_number: Some("27ABCDE1234F1Z5".into()),
            website: None,
            active: true,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    fn client() -> Client {
        Client {
            id: Some(ObjectId::new()),
            agency_id: ObjectId::new(),
            name: "Ravi Menon".into(),
            email: None,
            phone: "9876543210".into(),
            alternate_phone: None,
            address: None,
            city_id: None,
            date_of_birth: None,
            anniversary: None,
            passport_number: None,
            passport_expiry: None,
            pan_number: None,
            notes: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    fn texts(layout: &Layout) -> Vec<String> {
        layout
            .pages()
            .iter()
            .flatten()
            .filter_map(|op| match op {
                Op::Text { text, .. } => Some(text.clone()),
                Op::Rule { .. } => None,
            })
            .collect()
    }

    #[test]
    fn invoice_lists_lines_and_totals() {
        let invoice = Invoice {
            id: None,
            agency_id: ObjectId::new(),
            invoice_number: "INV/2026-27/0007".into(),
            invoice_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            booking_id: ObjectId::new(),
            client_id: ObjectId::new(),
            items: vec![InvoiceItem {
                description: "Kerala backwaters package".into(),
                quantity: 2,
                rate: 18500.0,
                tax_percent: 5.0,
                amount: 37000.0,
                tax: 1850.0,
            }],
            subtotal: 37000.0,
            tax_total: 1850.0,
            total: 38850.0,
            notes: None,
            created_by: ObjectId::new(),
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        };
        let layout = super::invoice(&agency(), &client(), "BK/2026/00012", &invoice);
        let all = texts(&layout);
        assert!(all.iter().any(|t| t.starts_with("INV/2026-27/0007")));
        assert!(all.contains(&"Kerala backwaters package".to_string()));
        assert!(all.contains(&"38,850.00".to_string()));
        assert!(all.iter().any(|t| t.contains("GSTIN: 27ABCDE1234F1Z5")));
    }

    #[test]
    fn subscription_invoice_renders() {
        let now = DateTime::now();
        let subscription = Subscription {
            id: None,
            agency_id: ObjectId::new(),
            package_id: ObjectId::new(),
            package_name: "Growth".into(),
            invoice_number: "SUB/2026-27/0003".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2027, 10, 18).unwrap(),
            amount: 24999.0,
            max_users: 10,
            max_branches: 3,
            status: crate::models::subscription::SubscriptionStatus::Active,
            payment_reference: Some("NEFT-7781".into()),
            created_at: now,
            updated_at: now,
        };
        let layout = subscription_invoice(&agency(), &subscription);
        let all = texts(&layout);
        assert!(all.contains(&"Growth".to_string()));
        assert!(all.contains(&"2026-10-19 to 2027-10-18".to_string()));
        let bytes = super::super::render(&layout).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
