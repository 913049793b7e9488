use std::{env, fmt::Display, str::FromStr};

use log::{info, warn};
use thiserror::Error;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub mongodb_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub cors_origin: Option<String>,
    pub fiscal_year_start_month: u32,
    pub platform_admin_email: Option<String>,
    pub platform_admin_password: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set, using development secret");
            DEV_JWT_SECRET.to_string()
        });

        let fiscal_year_start_month: u32 = try_load("FISCAL_YEAR_START_MONTH", "4")?;
        if !(1..=12).contains(&fiscal_year_start_month) {
            return Err(ConfigError::Invalid {
                key: "FISCAL_YEAR_START_MONTH",
                reason: format!("{fiscal_year_start_month} is not a month"),
            });
        }

        Ok(Self {
            host: try_load("HOST", "0.0.0.0")?,
            port: try_load("PORT", "8080")?,
            mongodb_uri: try_load("MONGODB_URI", "mongodb://localhost:27017")?,
            database_name: try_load("DATABASE_NAME", "travel_desk")?,
            jwt_secret,
            jwt_ttl_hours: try_load("JWT_TTL_HOURS", "24")?,
            cors_origin: env::var("CORS_ORIGIN").ok(),
            fiscal_year_start_month,
            platform_admin_email: env::var("PLATFORM_ADMIN_EMAIL").ok(),
            platform_admin_password: env::var("PLATFORM_ADMIN_PASSWORD").ok(),
        })
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            database_name: "travel_desk".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_ttl_hours: 24,
            cors_origin: None,
            fiscal_year_start_month: 4,
            platform_admin_email: None,
            platform_admin_password: None,
        }
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_load_uses_default_when_unset() {
        let port: u16 = try_load("TRAVEL_DESK_TEST_UNSET_PORT", "9090").unwrap();
        assert_eq!(port, 9090);
    }

    #[test]
    fn try_load_rejects_garbage() {
        let result: Result<u16, _> = try_load("TRAVEL_DESK_TEST_UNSET_BAD", "not-a-port");
        assert!(matches!(result, Err(ConfigError::Invalid { key, .. }) if key == "TRAVEL_DESK_TEST_UNSET_BAD"));
    }
}
