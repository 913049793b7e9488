use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::AppError;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

pub fn serialize_id_as_hex<S>(id: &Option<ObjectId>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match id {
        Some(oid) => serializer.serialize_str(&oid.to_hex()),
        None => serializer.serialize_none(),
    }
}

pub fn serialize_oid_as_hex<S>(id: &ObjectId, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&id.to_hex())
}

pub fn serialize_datetime<S>(dt: &DateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match dt.try_to_rfc3339_string() {
        Ok(s) => serializer.serialize_str(&s),
        Err(_) => serializer.serialize_i64(dt.timestamp_millis()),
    }
}

pub fn parse_id(id: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(id).map_err(|_| AppError::BadRequest(format!("Invalid id: {id}")))
}

pub fn parse_optional_id(id: Option<&str>) -> Result<Option<ObjectId>, AppError> {
    id.map(parse_id).transpose()
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Query string shared by every list endpoint.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<SortOrder>,
}

impl ListQuery {
    pub fn page(&self) -> u64 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn limit(&self) -> u64 {
        self.limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    pub fn skip(&self) -> u64 {
        (self.page() - 1) * self.limit()
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Optional inclusive `?from=&to=` date bounds.
#[derive(Deserialize, Debug, Default, Clone, Copy)]
pub struct DateRange {
    pub from: Option<chrono::NaiveDate>,
    pub to: Option<chrono::NaiveDate>,
}

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, query: &ListQuery) -> Self {
        let limit = query.limit();
        Self {
            data,
            total,
            page: query.page(),
            limit,
            total_pages: total.div_ceil(limit),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_defaults_and_clamps() {
        let q = ListQuery::default();
        assert_eq!((q.page(), q.limit(), q.skip()), (1, 20, 0));

        let q = ListQuery {
            page: Some(3),
            limit: Some(500),
            ..Default::default()
        };
        assert_eq!((q.page(), q.limit(), q.skip()), (3, 100, 200));

        let q = ListQuery {
            page: Some(0),
            limit: Some(0),
            ..Default::default()
        };
        assert_eq!((q.page(), q.limit()), (1, 20));
    }

    #[test]
    fn blank_search_is_ignored() {
        let q = ListQuery {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(q.search_term(), None);
    }

    #[test]
    fn total_pages_rounds_up() {
        let q = ListQuery {
            limit: Some(10),
            ..Default::default()
        };
        let page = Page::new(vec![1, 2, 3], 21, &q);
        assert_eq!(page.total_pages, 3);
        let empty: Page<u8> = Page::new(vec![], 0, &q);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(matches!(parse_id("abc"), Err(AppError::BadRequest(_))));
        assert!(parse_id("65f1c2a9e4b0a1b2c3d4e5f6").is_ok());
    }
}
