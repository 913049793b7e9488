use super::user::{UserResponse, MIN_PASSWORD_LEN};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::validation::{Validate, Validator};

/// Self-service sign-up of a new agency and its owner account.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegisterRequest {
    pub agency_name: String,
    pub agency_email: String,
    pub agency_phone: String,
    pub address: Option<String>,
    pub owner_name: String,
    pub owner_email: String,
    pub password: String,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .text("agency_name", &self.agency_name, 150)
            .email("agency_email", &self.agency_email)
            .phone("agency_phone", &self.agency_phone)
            .optional_max_len("address", self.address.as_deref(), 500)
            .text("owner_name", &self.owner_name, 100)
            .email("owner_email", &self.owner_email)
            .min_len("password", &self.password, MIN_PASSWORD_LEN)
            .max_len("password", &self.password, 72)
            .finish()
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), AppError> {
        Validator::new()
            .required("email", &self.email)
            .required("password", &self.password)
            .finish()
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}
