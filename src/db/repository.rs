use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    options::{CountOptions, FindOptions},
    Collection,
};
use serde::de::DeserializeOwned;

use super::MongoDB;
use crate::error::AppError;
use crate::models::common::{ListQuery, Page, SortOrder};
use crate::resource::{Dependent, Reference};

/// Filter restricting a query to one agency, or to nothing for platform data.
pub fn scoped(agency_id: Option<ObjectId>) -> Document {
    match agency_id {
        Some(id) => doc! { "agency_id": id },
        None => doc! {},
    }
}

pub fn by_id(id: ObjectId, agency_id: Option<ObjectId>) -> Document {
    let mut filter = scoped(agency_id);
    filter.insert("_id", id);
    filter
}

pub fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive substring match over `fields`.
pub fn search_filter(term: &str, fields: &[&str]) -> Option<Document> {
    if fields.is_empty() {
        return None;
    }
    let pattern = escape_regex(term);
    let clauses: Vec<Bson> = fields
        .iter()
        .map(|field| Bson::Document(doc! { *field: { "$regex": pattern.clone(), "$options": "i" } }))
        .collect();
    Some(doc! { "$or": clauses })
}

/// Sort document for `query`, falling back to newest first when the field
/// is not in `allowed`.
pub fn sort_document(query: &ListQuery, allowed: &[&str]) -> Document {
    let direction = match query.order.unwrap_or_default() {
        SortOrder::Asc => 1,
        SortOrder::Desc => -1,
    };
    match query.sort_by.as_deref() {
        Some(field) if allowed.contains(&field) => doc! { field: direction, "_id": direction },
        _ => doc! { "created_at": -1, "_id": -1 },
    }
}

/// Adds the search clause of `query` to `filter`.
pub fn with_search(mut filter: Document, query: &ListQuery, fields: &[&str]) -> Document {
    if let Some(search) = query.search_term().and_then(|t| search_filter(t, fields)) {
        filter.extend(search);
    }
    filter
}

pub async fn find_page<T>(
    collection: &Collection<T>,
    filter: Document,
    query: &ListQuery,
    sortable: &[&str],
) -> Result<Page<T>, AppError>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let total = collection
        .count_documents(filter.clone(), CountOptions::builder().build())
        .await?;
    let options = FindOptions::builder()
        .sort(sort_document(query, sortable))
        .skip(query.skip())
        .limit(query.limit() as i64)
        .build();
    let data: Vec<T> = collection.find(filter, options).await?.try_collect().await?;
    Ok(Page::new(data, total, query))
}

pub async fn find_all<T>(
    collection: &Collection<T>,
    filter: Document,
    sort: Document,
) -> Result<Vec<T>, AppError>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let options = FindOptions::builder().sort(sort).build();
    let items: Vec<T> = collection.find(filter, options).await?.try_collect().await?;
    Ok(items)
}

pub async fn find_scoped<T>(
    collection: &Collection<T>,
    id: ObjectId,
    agency_id: Option<ObjectId>,
    label: &str,
) -> Result<T, AppError>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    collection
        .find_one(by_id(id, agency_id), None)
        .await?
        .ok_or_else(|| AppError::not_found(label))
}

/// Fails with 409 when another row in the scope already uses `value`
/// (compared case-insensitively).
pub async fn ensure_unique(
    collection: &Collection<Document>,
    mut scope: Document,
    field: &str,
    value: &str,
    exclude: Option<ObjectId>,
    label: &str,
) -> Result<(), AppError> {
    scope.insert(
        field,
        doc! { "$regex": format!("^{}$", escape_regex(value)), "$options": "i" },
    );
    if let Some(id) = exclude {
        scope.insert("_id", doc! { "$ne": id });
    }
    if collection.count_documents(scope, None).await? > 0 {
        return Err(AppError::Conflict(format!(
            "{label} with {field} '{value}' already exists"
        )));
    }
    Ok(())
}

/// Fails with 400 when an id field of `document` points at nothing in the agency.
pub async fn ensure_references(
    db: &MongoDB,
    agency_id: Option<ObjectId>,
    document: &Document,
    references: &[Reference],
) -> Result<(), AppError> {
    for reference in references {
        let Ok(id) = document.get_object_id(reference.field) else {
            continue;
        };
        let found = db
            .documents(reference.collection)
            .count_documents(by_id(id, agency_id), None)
            .await?;
        if found == 0 {
            return Err(AppError::BadRequest(format!(
                "{} refers to a {} that does not exist",
                reference.field, reference.label
            )));
        }
    }
    Ok(())
}

/// Fails with 400 unless every id in `ids` is a row of `reference.collection`
/// owned by the agency. Repeated ids are checked once.
pub async fn ensure_all_exist(
    db: &MongoDB,
    agency_id: ObjectId,
    ids: impl IntoIterator<Item = ObjectId>,
    reference: &Reference,
) -> Result<(), AppError> {
    let wanted = distinct(ids);
    if wanted.is_empty() {
        return Ok(());
    }
    let found = db
        .documents(reference.collection)
        .count_documents(
            doc! { "agency_id": agency_id, "_id": { "$in": wanted.clone() } },
            None,
        )
        .await?;
    if found != wanted.len() as u64 {
        return Err(AppError::BadRequest(format!(
            "{} refers to a {} that does not exist",
            reference.field, reference.label
        )));
    }
    Ok(())
}

/// `ids` without repeats, in first-seen order.
pub fn distinct(ids: impl IntoIterator<Item = ObjectId>) -> Vec<ObjectId> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Fails with 409 while any dependent row still points at `id`.
pub async fn ensure_unreferenced(
    db: &MongoDB,
    id: ObjectId,
    label: &str,
    dependents: &[Dependent],
) -> Result<(), AppError> {
    for dependent in dependents {
        let count = db
            .documents(dependent.collection)
            .count_documents(doc! { dependent.field: id }, None)
            .await?;
        if count > 0 {
            return Err(AppError::Conflict(format!(
                "{label} is used by {count} {}; remove them first",
                dependent.label
            )));
        }
    }
    Ok(())
}

/// Adds equality filters on id-valued query parameters listed in `allowed`.
pub fn id_filters<'a>(
    mut filter: Document,
    params: impl IntoIterator<Item = (&'a String, &'a String)>,
    allowed: &[&str],
) -> Result<Document, AppError> {
    for (key, value) in params {
        if allowed.contains(&key.as_str()) && !value.is_empty() {
            let id = ObjectId::parse_str(value)
                .map_err(|_| AppError::BadRequest(format!("Invalid {key}: {value}")))?;
            filter.insert(key.as_str(), id);
        }
    }
    Ok(filter)
}

/// Adds an inclusive date range on an ISO date field.
pub fn date_range(
    mut filter: Document,
    field: &str,
    from: Option<chrono::NaiveDate>,
    to: Option<chrono::NaiveDate>,
) -> Document {
    let mut range = Document::new();
    if let Some(from) = from {
        range.insert("$gte", from.to_string());
    }
    if let Some(to) = to {
        range.insert("$lte", to.to_string());
    }
    if !range.is_empty() {
        filter.insert(field, range);
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn distinct_keeps_first_occurrence() {
        let (a, b) = (ObjectId::new(), ObjectId::new());
        assert_eq!(distinct([a, b, a, a, b]), vec![a, b]);
        assert!(distinct([]).is_empty());
    }

    #[test]
    fn escapes_regex_metacharacters() {
        assert_eq!(escape_regex("a.b*c"), "a\\.b\\*c");
        assert_eq!(escape_regex("(Goa)"), "\\(Goa\\)");
        assert_eq!(escape_regex("plain"), "plain");
    }

    #[test]
    fn search_builds_or_over_fields() {
        let filter = search_filter("taj", &["name", "address"]).unwrap();
        let clauses = filter.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 2);
        let first = clauses[0].as_document().unwrap();
        let name = first.get_document("name").unwrap();
        assert_eq!(name.get_str("$regex").unwrap(), "taj");
        assert_eq!(name.get_str("$options").unwrap(), "i");
        assert!(search_filter("x", &[]).is_none());
    }

    #[test]
    fn sort_falls_back_for_unknown_field() {
        let query = ListQuery {
            sort_by: Some("password".into()),
            ..Default::default()
        };
        assert_eq!(
            sort_document(&query, &["name"]),
            doc! { "created_at": -1, "_id": -1 }
        );

        let query = ListQuery {
            sort_by: Some("name".into()),
            order: Some(SortOrder::Asc),
            ..Default::default()
        };
        assert_eq!(sort_document(&query, &["name"]), doc! { "name": 1, "_id": 1 });
    }

    #[test]
    fn scoped_filters() {
        let agency = ObjectId::new();
        let id = ObjectId::new();
        assert_eq!(by_id(id, Some(agency)), doc! { "agency_id": agency, "_id": id });
        assert_eq!(by_id(id, None), doc! { "_id": id });
    }

    #[test]
    fn id_filters_only_accept_whitelisted_keys() {
        let state = ObjectId::new();
        let mut params = HashMap::new();
        params.insert("state_id".to_string(), state.to_hex());
        params.insert("agency_id".to_string(), ObjectId::new().to_hex());
        let filter = id_filters(doc! {}, &params, &["state_id"]).unwrap();
        assert_eq!(filter, doc! { "state_id": state });

        let mut bad = HashMap::new();
        bad.insert("state_id".to_string(), "nope".to_string());
        assert!(id_filters(doc! {}, &bad, &["state_id"]).is_err());
    }

    #[test]
    fn date_range_is_inclusive() {
        let from = chrono::NaiveDate::from_ymd_opt(2026, 1, 1);
        let filter = date_range(doc! {}, "travel_date", from, None);
        assert_eq!(filter, doc! { "travel_date": { "$gte": "2026-01-01" } });
        assert_eq!(date_range(doc! {}, "travel_date", None, None), doc! {});
    }
}
