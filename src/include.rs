//! Batched eager loading of relations (`include` / `populate`).
//!
//! For every include item one query is issued against the related model,
//! whatever the number of owners: owners are grouped by the value of the
//! relation's `key_from`, and the distinct non-null values go into a single
//! `inq` condition. Nested items are handed down to that query, so a spec
//! of depth `d` costs `d` queries per branch.
//!
//! ```
//! use netabase_orm::prelude::*;
//!
//! # fn main() -> OrmResult<()> {
//! let schema = Schema::memory();
//! let user = schema.define("User", Properties::new().with("name", PropertyType::String))?;
//! let post = schema.define("Post", Properties::new().with("title", PropertyType::String))?;
//! user.has_many(&post, RelationOptions::default())?;
//!
//! let alice = user.create(row! { "name" => "alice" })?;
//! post.create(row! { "title" => "one", "userId" => alice.id() })?;
//!
//! let mut users = user.all(&Filter::new())?;
//! user.include(&mut users, "posts")?;
//! assert_eq!(users[0].cached("posts").map(|r| r.many().len()), Some(1));
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, warn};

use crate::error::{OrmError, OrmResult};
use crate::model::{Instance, Model, Related};
use crate::query::{Filter, FilterValue, IncludeItem, IncludeSpec, Where};
use crate::relational::{Relation, RelationKind};
use crate::value::Value;

/// Owners grouped by the string form of one key: a representative value
/// for the query plus the positions of every owner sharing it.
type KeyIndex = IndexMap<String, (Value, Vec<usize>)>;

impl Model {
    /// Eager-load `spec` onto `objects`, filling each object's relation
    /// cache. Owners without a match get an empty list or `None`.
    pub fn include(&self, objects: &mut [Instance], spec: impl Into<IncludeSpec>) -> OrmResult<()> {
        load(self, objects, &spec.into())
    }

    /// [`include`](Self::include) for specs carrying per-item `where`
    /// conditions.
    pub fn populate(&self, objects: &mut [Instance], spec: impl Into<IncludeSpec>) -> OrmResult<()> {
        self.include(objects, spec)
    }
}

fn index_by(objects: &[Instance], key: &str) -> KeyIndex {
    let mut index = KeyIndex::new();
    for (position, object) in objects.iter().enumerate() {
        let value = object.get(key);
        index
            .entry(value.key_string())
            .or_insert_with(|| (value, Vec::new()))
            .1
            .push(position);
    }
    index
}

pub(crate) fn load(model: &Model, objects: &mut [Instance], spec: &IncludeSpec) -> OrmResult<()> {
    if objects.is_empty() || spec.is_empty() {
        return Ok(());
    }

    let relations = model.relations();
    let mut resolved = Vec::with_capacity(spec.len());
    for item in spec.iter() {
        let relation = relations.get(&item.relation).ok_or_else(|| {
            OrmError::Configuration(format!(
                "Relation \"{}\" is not defined for {} model",
                item.relation,
                model.name()
            ))
        })?;
        resolved.push((relation.clone(), item));
    }

    let mut indexes: HashMap<String, KeyIndex> = HashMap::new();
    let mut first_error = None;
    for (relation, item) in resolved {
        if !indexes.contains_key(&relation.key_from) {
            let index = index_by(objects, &relation.key_from);
            indexes.insert(relation.key_from.clone(), index);
        }
        let index = &indexes[&relation.key_from];
        if let Err(e) = load_item(model, objects, &relation, item, index) {
            warn!("{}: include `{}` failed: {e}", model.name(), relation.name);
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn load_item(
    model: &Model,
    objects: &mut [Instance],
    relation: &Relation,
    item: &IncludeItem,
    index: &KeyIndex,
) -> OrmResult<()> {
    let empty = || {
        if relation.multiple {
            Related::Many(Vec::new())
        } else {
            Related::One(None)
        }
    };
    for object in objects.iter_mut() {
        object.cache(&relation.name, empty());
    }

    let keys: Vec<Value> = index
        .values()
        .filter(|(value, _)| !value.is_null())
        .map(|(value, _)| value.clone())
        .collect();
    if keys.is_empty() {
        return Ok(());
    }
    debug!(
        "{}: include `{}` for {} owners, {} keys",
        model.name(),
        relation.name,
        objects.len(),
        keys.len()
    );

    let schema = model.schema();
    let matches: Vec<(String, Instance)> = match &relation.kind {
        RelationKind::HasManyThrough {
            through, collect, ..
        } => {
            let join = schema.model(through)?;
            let target = IncludeItem {
                relation: collect.clone(),
                where_: item.where_.clone(),
                nested: item.nested.clone(),
            };
            let filter = Filter::new()
                .condition(relation.key_to.clone(), FilterValue::In(keys))
                .include(target);
            join.all(&filter)?
                .into_iter()
                .filter_map(|mut link| {
                    let key = link.get(&relation.key_to).key_string();
                    match link.cached.shift_remove(collect) {
                        Some(Related::One(Some(target))) => Some((key, *target)),
                        _ => None,
                    }
                })
                .collect()
        }
        _ => {
            let target = schema.model(&relation.model_to)?;
            let mut conditions = item.where_.clone().unwrap_or_else(Where::new);
            conditions.insert(relation.key_to.clone(), FilterValue::In(keys));
            let filter = Filter::new()
                .with_where(conditions)
                .include(item.nested.clone());
            target
                .all(&filter)?
                .into_iter()
                .map(|found| (found.get(&relation.key_to).key_string(), found))
                .collect()
        }
    };

    for (key, found) in matches {
        let Some((_, owners)) = index.get(&key) else {
            continue;
        };
        for &position in owners {
            let object = &mut objects[position];
            match object.cached.get_mut(&relation.name) {
                Some(Related::Many(items)) => items.push(found.clone()),
                _ => object.cache(&relation.name, Related::One(Some(Box::new(found.clone())))),
            }
        }
    }
    Ok(())
}
