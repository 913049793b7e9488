//! PDF output for invoices, receipts and reservation vouchers.

pub mod documents;
pub mod layout;
mod render;

pub use render::render;

use actix_web::{http::header, HttpResponse};

use crate::error::AppError;
use layout::Layout;

/// Renders `layout` and wraps it in an inline `application/pdf` response.
pub fn pdf_response(layout: &Layout, file_name: &str) -> Result<HttpResponse, AppError> {
    let bytes = render(layout)?;
    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}.pdf\"", file_name.replace('/', "-")),
        ))
        .body(bytes))
}
