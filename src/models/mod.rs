pub mod agency;
pub mod auth;
pub mod booking;
pub mod client;
pub mod common;
pub mod geo;
pub mod group_booking;
pub mod hotel_booking;
pub mod invoice;
pub mod journey_booking;
pub mod receipt;
pub mod reference;
pub mod subscription;
pub mod user;
pub mod vehicle_booking;

// Re-export the models handlers use most
pub use auth::{AuthResponse, LoginRequest, RegisterRequest};
pub use common::{ListQuery, Page};
pub use user::{Claims, User, UserResponse};
