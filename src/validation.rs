//! Request body validation.
//!
//! Every input type implements [`Validate`] by feeding its fields through a
//! [`Validator`], which collects all failures so the client sees them at once.

use chrono::NaiveDate;

use crate::error::{AppError, FieldError};

pub trait Validate {
    fn validate(&self) -> Result<(), AppError>;
}

#[derive(Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, field: &str, message: impl Into<String>) -> &mut Self {
        self.errors.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
        self
    }

    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.error(field, "is required");
        }
        self
    }

    /// Required and at most `max` characters.
    pub fn text(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        self.required(field, value);
        self.max_len(field, value, max)
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        if value.chars().count() > max {
            self.error(field, format!("must be at most {max} characters"));
        }
        self
    }

    pub fn optional_max_len(&mut self, field: &str, value: Option<&str>, max: usize) -> &mut Self {
        if let Some(v) = value {
            self.max_len(field, v, max);
        }
        self
    }

    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_email(value) {
            self.error(field, "must be a valid e-mail address");
        }
        self
    }

    pub fn optional_email(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) if !v.is_empty() => self.email(field, v),
            _ => self,
        }
    }

    pub fn phone(&mut self, field: &str, value: &str) -> &mut Self {
        if !is_phone(value) {
            self.error(field, "must be a valid phone number");
        }
        self
    }

    pub fn optional_phone(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) if !v.is_empty() => self.phone(field, v),
            _ => self,
        }
    }

    pub fn min_len(&mut self, field: &str, value: &str, min: usize) -> &mut Self {
        if value.chars().count() < min {
            self.error(field, format!("must be at least {min} characters"));
        }
        self
    }

    pub fn non_negative(&mut self, field: &str, value: f64) -> &mut Self {
        if !value.is_finite() || value < 0.0 {
            self.error(field, "must be zero or greater");
        }
        self
    }

    pub fn positive(&mut self, field: &str, value: f64) -> &mut Self {
        if !value.is_finite() || value <= 0.0 {
            self.error(field, "must be greater than zero");
        }
        self
    }

    pub fn at_least(&mut self, field: &str, value: i64, min: i64) -> &mut Self {
        if value < min {
            self.error(field, format!("must be at least {min}"));
        }
        self
    }

    pub fn at_most(&mut self, field: &str, value: i64, max: i64) -> &mut Self {
        if value > max {
            self.error(field, format!("must be at most {max}"));
        }
        self
    }

    pub fn range(&mut self, field: &str, value: f64, min: f64, max: f64) -> &mut Self {
        if !(min..=max).contains(&value) {
            self.error(field, format!("must be between {min} and {max}"));
        }
        self
    }

    /// `end` must not be before `start`.
    pub fn not_before(&mut self, field: &str, start: NaiveDate, end: NaiveDate) -> &mut Self {
        if end < start {
            self.error(field, format!("must be on or after {start}"));
        }
        self
    }

    /// `end` must be strictly after `start`.
    pub fn after(&mut self, field: &str, start: NaiveDate, end: NaiveDate) -> &mut Self {
        if end <= start {
            self.error(field, format!("must be after {start}"));
        }
        self
    }

    pub fn id(&mut self, field: &str, value: &str) -> &mut Self {
        if mongodb::bson::oid::ObjectId::parse_str(value).is_err() {
            self.error(field, "must be a valid id");
        }
        self
    }

    pub fn optional_id(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => self.id(field, v),
            None => self,
        }
    }

    /// Validates each child, prefixing its field names with `field[i].`.
    pub fn nested<T: Validate>(&mut self, field: &str, items: &[T]) -> &mut Self {
        for (i, item) in items.iter().enumerate() {
            if let Err(AppError::Validation(child)) = item.validate() {
                for e in child {
                    self.error(&format!("{field}[{i}].{}", e.field), e.message);
                }
            }
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !value.chars().any(char::is_whitespace)
}

fn is_phone(value: &str) -> bool {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    (7..=15).contains(&digits)
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leg {
        name: String,
    }

    impl Validate for Leg {
        fn validate(&self) -> Result<(), AppError> {
            Validator::new().required("name", &self.name).finish()
        }
    }

    fn fields(result: Result<(), AppError>) -> Vec<String> {
        match result {
            Err(AppError::Validation(errors)) => errors.into_iter().map(|e| e.field).collect(),
            Err(other) => panic!("unexpected error {other}"),
            Ok(()) => vec![],
        }
    }

    #[test]
    fn collects_every_failure() {
        let result = Validator::new()
            .required("name", "  ")
            .email("email", "nope")
            .non_negative("amount", -1.0)
            .finish();
        assert_eq!(fields(result), vec!["name", "email", "amount"]);
    }

    #[test]
    fn accepts_valid_values() {
        let result = Validator::new()
            .text("name", "Goa Escape", 100)
            .email("email", "desk@agency.in")
            .phone("phone", "+91 98765-43210")
            .positive("amount", 10.5)
            .finish();
        assert!(result.is_ok());
    }

    #[test]
    fn email_needs_exactly_one_at() {
        assert!(is_email("desk@sunrise.travel"));
        assert!(!is_email("a@@b.c"));
        assert!(!is_email("a@b@c.in"));
        assert!(!is_email("nobody.in"));
    }

    #[test]
    fn at_most_caps_counts() {
        assert!(Validator::new().at_most("days", 10, 10).finish().is_ok());
        assert_eq!(fields(Validator::new().at_most("days", 11, 10).finish()), vec!["days"]);
    }

    #[test]
    fn phone_rejects_letters_and_short_numbers() {
        assert!(!is_phone("12345"));
        assert!(!is_phone("98765abc43"));
        assert!(is_phone("(022) 2345 6789"));
    }

    #[test]
    fn date_ordering() {
        let d1 = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 5, 3).unwrap();
        assert!(Validator::new().after("check_out", d1, d2).finish().is_ok());
        assert_eq!(
            fields(Validator::new().after("check_out", d1, d1).finish()),
            vec!["check_out"]
        );
        assert!(Validator::new().not_before("return_date", d1, d1).finish().is_ok());
    }

    #[test]
    fn nested_prefixes_child_fields() {
        let legs = vec![
            Leg { name: "Day 1".into() },
            Leg { name: String::new() },
        ];
        let result = Validator::new().nested("itineraries", &legs).finish();
        assert_eq!(fields(result), vec!["itineraries[1].name"]);
    }

    #[test]
    fn id_must_be_object_id() {
        assert_eq!(
            fields(Validator::new().id("client_id", "123").finish()),
            vec!["client_id"]
        );
        assert!(Validator::new()
            .id("client_id", "65f1c2a9e4b0a1b2c3d4e5f6")
            .finish()
            .is_ok());
    }
}
