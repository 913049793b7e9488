use actix_web::{error::InternalError, web, HttpRequest, HttpResponse};
use log::warn;
use serde_json::json;

use crate::db::MongoDB;
use crate::error::AppError;
use crate::handlers::{
    agency, auth, bookings, clients, follow_ups, group_bookings, hotel_bookings, invoices,
    journey_bookings, receipts, resources, staff, subscriptions, vehicle_bookings,
};
use crate::models::{
    agency::{Branch, Role},
    geo::{City, Country, State},
    reference::{Bank, Fair, Hotel, Package, Sector, Service},
};

/// Reports whether the API is up and the database answers.
pub async fn health(db: web::Data<MongoDB>) -> HttpResponse {
    match db.ping().await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "ok", "database": "up" })),
        Err(e) => {
            warn!("Health check failed: {e}");
            HttpResponse::ServiceUnavailable().json(json!({ "status": "degraded", "database": "down" }))
        }
    }
}

fn json_error(err: actix_web::error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = actix_web::ResponseError::error_response(&AppError::BadRequest(format!(
        "Invalid request body: {err}"
    )));
    InternalError::from_response(err, response).into()
}

fn query_error(err: actix_web::error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = actix_web::ResponseError::error_response(&AppError::BadRequest(format!(
        "Invalid query string: {err}"
    )));
    InternalError::from_response(err, response).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::QueryConfig::default().error_handler(query_error))
        .service(
            web::scope("/api")
                .route("/health", web::get().to(health))
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(auth::register))
                        .route("/login", web::post().to(auth::login))
                        .route("/me", web::get().to(auth::me)),
                )
                .service(
                    web::resource("/agency")
                        .route(web::get().to(agency::get_profile))
                        .route(web::put().to(agency::update_profile)),
                )
                .service(
                    web::scope("/agencies")
                        .route("", web::get().to(agency::list_agencies))
                        .route("/{id}/status", web::patch().to(agency::set_status)),
                )
                .service(resources::scope::<Country>("/countries"))
                .service(resources::scope::<State>("/states"))
                .service(resources::scope::<City>("/cities"))
                .service(resources::scope::<Bank>("/banks"))
                .service(resources::scope::<Hotel>("/hotels"))
                .service(resources::scope::<Sector>("/sectors"))
                .service(resources::scope::<Service>("/services"))
                .service(resources::scope::<Fair>("/fairs"))
                .service(resources::scope::<Branch>("/branches"))
                .service(resources::scope::<Role>("/roles"))
                .service(resources::scope::<Package>("/packages"))
                .service(
                    web::scope("/staff")
                        .route("", web::get().to(staff::list_staff))
                        .route("", web::post().to(staff::create_staff))
                        .route("/{id}", web::get().to(staff::get_staff))
                        .route("/{id}", web::put().to(staff::update_staff))
                        .route("/{id}", web::delete().to(staff::delete_staff))
                        .route("/{id}/password", web::put().to(staff::change_password)),
                )
                .service(
                    web::scope("/clients")
                        .route("", web::get().to(clients::list_clients))
                        .route("", web::post().to(clients::create_client))
                        .route("/{id}", web::get().to(clients::get_client))
                        .route("/{id}", web::put().to(clients::update_client))
                        .route("/{id}", web::delete().to(clients::delete_client)),
                )
                .service(
                    web::scope("/bookings")
                        .route("", web::get().to(bookings::list_bookings))
                        .route("", web::post().to(bookings::create_booking))
                        .route("/{id}", web::get().to(bookings::get_booking))
                        .route("/{id}", web::put().to(bookings::update_booking))
                        .route("/{id}", web::delete().to(bookings::delete_booking))
                        .route("/{id}/status", web::patch().to(bookings::update_status))
                        .route("/{id}/follow-ups", web::get().to(follow_ups::list_for_booking))
                        .route("/{id}/follow-ups", web::post().to(follow_ups::create_follow_up)),
                )
                .service(
                    web::scope("/follow-ups")
                        .route("/due", web::get().to(follow_ups::due_follow_ups))
                        .route("/{id}", web::put().to(follow_ups::update_follow_up))
                        .route("/{id}", web::delete().to(follow_ups::delete_follow_up)),
                )
                .service(
                    web::scope("/group-bookings")
                        .route("", web::get().to(group_bookings::list_group_bookings))
                        .route("", web::post().to(group_bookings::create_group_booking))
                        .route("/{id}", web::get().to(group_bookings::get_group_booking))
                        .route("/{id}", web::put().to(group_bookings::update_group_booking))
                        .route("/{id}", web::delete().to(group_bookings::delete_group_booking)),
                )
                .service(
                    web::scope("/hotel-bookings")
                        .route("", web::get().to(hotel_bookings::list_hotel_bookings))
                        .route("", web::post().to(hotel_bookings::create_hotel_booking))
                        .route("/{id}", web::get().to(hotel_bookings::get_hotel_booking))
                        .route("/{id}", web::put().to(hotel_bookings::update_hotel_booking))
                        .route("/{id}", web::delete().to(hotel_bookings::delete_hotel_booking))
                        .route("/{id}/voucher", web::get().to(hotel_bookings::hotel_voucher)),
                )
                .service(
                    web::scope("/journey-bookings")
                        .route("", web::get().to(journey_bookings::list_journey_bookings))
                        .route("", web::post().to(journey_bookings::create_journey_booking))
                        .route("/{id}", web::get().to(journey_bookings::get_journey_booking))
                        .route("/{id}", web::put().to(journey_bookings::update_journey_booking))
                        .route(
                            "/{id}",
                            web::delete().to(journey_bookings::delete_journey_booking),
                        ),
                )
                .service(
                    web::scope("/vehicle-bookings")
                        .route("", web::get().to(vehicle_bookings::list_vehicle_bookings))
                        .route("", web::post().to(vehicle_bookings::create_vehicle_booking))
                        .route("/{id}", web::get().to(vehicle_bookings::get_vehicle_booking))
                        .route("/{id}", web::put().to(vehicle_bookings::update_vehicle_booking))
                        .route(
                            "/{id}",
                            web::delete().to(vehicle_bookings::delete_vehicle_booking),
                        )
                        .route("/{id}/voucher", web::get().to(vehicle_bookings::vehicle_voucher)),
                )
                .service(
                    web::scope("/receipts")
                        .route("", web::get().to(receipts::list_receipts))
                        .route("", web::post().to(receipts::create_receipt))
                        .route("/{id}", web::get().to(receipts::get_receipt))
                        .route("/{id}", web::put().to(receipts::update_receipt))
                        .route("/{id}", web::delete().to(receipts::delete_receipt))
                        .route("/{id}/pdf", web::get().to(receipts::receipt_pdf)),
                )
                .service(
                    web::scope("/invoices")
                        .route("", web::get().to(invoices::list_invoices))
                        .route("", web::post().to(invoices::create_invoice))
                        .route("/{id}", web::get().to(invoices::get_invoice))
                        .route("/{id}", web::delete().to(invoices::delete_invoice))
                        .route("/{id}/pdf", web::get().to(invoices::invoice_pdf)),
                )
                .service(
                    web::scope("/subscriptions")
                        .route("", web::get().to(subscriptions::list_subscriptions))
                        .route("", web::post().to(subscriptions::subscribe))
                        .route("/current", web::get().to(subscriptions::current_subscription))
                        .route("/{id}/cancel", web::post().to(subscriptions::cancel_subscription))
                        .route("/{id}/invoice", web::get().to(subscriptions::subscription_invoice)),
                ),
        );
}
