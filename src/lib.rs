pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pdf;
pub mod permissions;
pub mod resource;
pub mod routes;
pub mod validation;
