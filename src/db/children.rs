//! Upsert/delete sync of child rows owned by a parent (family members of a
//! client, legs of a vehicle booking, ...).
//!
//! The client sends the full child list on every save. Items carrying an `id`
//! update the existing row, items without one are inserted, and stored rows
//! missing from the list are deleted. All three steps run in the parent's
//! transaction.

use std::collections::HashSet;

use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    ClientSession,
};

use super::{collect_with_session, MongoDB};
use crate::error::AppError;

pub trait ChildInput {
    fn id(&self) -> Option<&str>;
    fn to_document(&self) -> Result<Document, AppError>;
}

#[derive(Debug, Default, PartialEq)]
pub struct SyncPlan {
    pub delete: Vec<ObjectId>,
    pub update: Vec<(ObjectId, Document)>,
    pub insert: Vec<Document>,
}

/// Decides what to do with each child. An incoming id that is not among
/// `existing` (or appears twice) is rejected rather than silently inserted.
pub fn plan_sync<C: ChildInput>(existing: &[ObjectId], incoming: &[C]) -> Result<SyncPlan, AppError> {
    let known: HashSet<ObjectId> = existing.iter().copied().collect();
    let mut kept = HashSet::new();
    let mut plan = SyncPlan::default();

    for child in incoming {
        let fields = child.to_document()?;
        match child.id() {
            Some(raw) => {
                let id = ObjectId::parse_str(raw)
                    .map_err(|_| AppError::BadRequest(format!("Invalid child id: {raw}")))?;
                if !known.contains(&id) {
                    return Err(AppError::BadRequest(format!(
                        "Child {raw} does not belong to this record"
                    )));
                }
                if !kept.insert(id) {
                    return Err(AppError::BadRequest(format!("Child {raw} is listed twice")));
                }
                plan.update.push((id, fields));
            }
            None => plan.insert.push(fields),
        }
    }

    plan.delete = existing
        .iter()
        .filter(|id| !kept.contains(id))
        .copied()
        .collect();
    Ok(plan)
}

/// Applies `incoming` to the children of `parent_id` stored in `collection`.
pub async fn sync_children<C: ChildInput>(
    db: &MongoDB,
    session: &mut ClientSession,
    collection: &str,
    parent_field: &str,
    parent_id: ObjectId,
    agency_id: ObjectId,
    incoming: &[C],
) -> Result<(), AppError> {
    let children = db.documents(collection);
    let cursor = children
        .find_with_session(doc! { parent_field: parent_id }, None, session)
        .await?;
    let existing: Vec<ObjectId> = collect_with_session(cursor, session)
        .await?
        .iter()
        .filter_map(|d| d.get_object_id("_id").ok())
        .collect();

    let plan = plan_sync(&existing, incoming)?;
    let now = DateTime::now();

    if !plan.delete.is_empty() {
        children
            .delete_many_with_session(doc! { "_id": { "$in": plan.delete } }, None, session)
            .await?;
    }
    for (id, mut fields) in plan.update {
        fields.insert("updated_at", now);
        children
            .update_one_with_session(doc! { "_id": id }, doc! { "$set": fields }, None, session)
            .await?;
    }
    if !plan.insert.is_empty() {
        let docs: Vec<Document> = plan
            .insert
            .into_iter()
            .map(|mut fields| {
                fields.insert("agency_id", agency_id);
                fields.insert(parent_field, parent_id);
                fields.insert("created_at", now);
                fields.insert("updated_at", now);
                fields
            })
            .collect();
        children.insert_many_with_session(docs, None, session).await?;
    }
    Ok(())
}

/// Removes every child of `parent_id`; used when the parent is deleted.
pub async fn delete_children(
    db: &MongoDB,
    session: &mut ClientSession,
    collection: &str,
    parent_field: &str,
    parent_id: ObjectId,
) -> Result<(), AppError> {
    db.documents(collection)
        .delete_many_with_session(doc! { parent_field: parent_id }, None, session)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leg {
        id: Option<String>,
        name: &'static str,
    }

    impl ChildInput for Leg {
        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }

        fn to_document(&self) -> Result<Document, AppError> {
            Ok(doc! { "name": self.name })
        }
    }

    #[test]
    fn updates_inserts_and_deletes() {
        let keep = ObjectId::new();
        let drop = ObjectId::new();
        let incoming = vec![
            Leg {
                id: Some(keep.to_hex()),
                name: "Day 1",
            },
            Leg {
                id: None,
                name: "Day 2",
            },
        ];

        let plan = plan_sync(&[keep, drop], &incoming).unwrap();
        assert_eq!(plan.update, vec![(keep, doc! { "name": "Day 1" })]);
        assert_eq!(plan.insert, vec![doc! { "name": "Day 2" }]);
        assert_eq!(plan.delete, vec![drop]);
    }

    #[test]
    fn empty_list_deletes_everything() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        let plan = plan_sync::<Leg>(&[a, b], &[]).unwrap();
        assert_eq!(plan.delete, vec![a, b]);
        assert!(plan.update.is_empty() && plan.insert.is_empty());
    }

    #[test]
    fn rejects_foreign_ids() {
        let incoming = vec![Leg {
            id: Some(ObjectId::new().to_hex()),
            name: "stolen",
        }];
        assert!(matches!(
            plan_sync(&[ObjectId::new()], &incoming),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let id = ObjectId::new();
        let incoming = vec![
            Leg {
                id: Some(id.to_hex()),
                name: "a",
            },
            Leg {
                id: Some(id.to_hex()),
                name: "b",
            },
        ];
        assert!(plan_sync(&[id], &incoming).is_err());
    }
}
