//! Named, chainable query scopes.
//!
//! A scope is a [`Filter`] with a name. Class-level scopes are declared with
//! [`Model::scope`] and opened with [`Model::scoped`]; every to-many
//! relation is also reachable as a scope on its owner through
//! [`Instance::scoped`], filtered by the owner's key. Relation scopes cache
//! their result on the owner under the scope name; class-level scopes never
//! cache.
//!
//! ```
//! use netabase_orm::prelude::*;
//!
//! # fn main() -> OrmResult<()> {
//! let schema = Schema::memory();
//! let station = schema.define(
//!     "Station",
//!     Properties::new()
//!         .with("isActive", PropertyType::Boolean)
//!         .with("isUnderground", PropertyType::Boolean),
//! )?;
//! station.scope("active", Filter::new().where_eq("isActive", true));
//! station.scope("underground", Filter::new().where_eq("isUnderground", true));
//!
//! let created = station.scoped("active")?.scope("underground")?.create(row! {})?;
//! assert_eq!(created.get("isActive"), Value::Bool(true));
//! assert_eq!(created.get("isUnderground"), Value::Bool(true));
//! # Ok(())
//! # }
//! ```

use log::{debug, warn};

use crate::error::{OrmError, OrmResult};
use crate::model::{Instance, Model, Related};
use crate::query::{Filter, IncludeItem, Where};
use crate::relational::{Relation, RelationKind};
use crate::value::{Row, Value};

impl Model {
    /// Declare a class-level scope. Redefining a name replaces it.
    pub fn scope(&self, name: &str, filter: Filter) {
        debug!("{}: scope `{name}`", self.name());
        self.definition_mut().scopes.insert(name.to_string(), filter);
    }

    /// Open a class-level scope.
    pub fn scoped(&self, name: &str) -> OrmResult<Scope<'static>> {
        let filter = self.scope_filter(name).ok_or_else(|| {
            OrmError::Configuration(format!(
                "Scope \"{name}\" is not defined for {} model",
                self.name()
            ))
        })?;
        Ok(Scope {
            owner: None,
            model: self.clone(),
            name: name.to_string(),
            filter,
            relation: None,
            owner_key: Value::Null,
        })
    }
}

impl Instance {
    /// Open the scope of a to-many relation of this instance.
    pub fn scoped(&mut self, name: &str) -> OrmResult<Scope<'_>> {
        let relation = self
            .model()
            .relation(name)
            .filter(|relation| relation.multiple)
            .ok_or_else(|| {
                OrmError::Configuration(format!(
                    "Relation \"{name}\" is not a to-many relation of {} model",
                    self.model().name()
                ))
            })?;
        let model = self.model().schema().model(&relation.model_to)?;
        let owner_key = self.get(&relation.key_from);
        let filter = match relation.kind {
            RelationKind::HasMany => Filter::new().where_eq(relation.key_to.clone(), owner_key.clone()),
            _ => Filter::new(),
        };
        Ok(Scope {
            owner: Some(self),
            model,
            name: name.to_string(),
            filter,
            relation: Some(relation),
            owner_key,
        })
    }
}

/// An opened scope. Borrows its owner instance mutably so that the result
/// cache can be kept on it.
pub struct Scope<'a> {
    owner: Option<&'a mut Instance>,
    model: Model,
    name: String,
    filter: Filter,
    relation: Option<Relation>,
    owner_key: Value,
}

impl std::fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("model", &self.model)
            .field("name", &self.name)
            .field("filter", &self.filter)
            .finish()
    }
}

impl<'a> Scope<'a> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Conditions against the target model's records.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Chain a class-level scope of the target model: `where` clauses
    /// compose key by key and the result caches as `outer.inner`.
    pub fn scope(mut self, name: &str) -> OrmResult<Scope<'a>> {
        let sub = self.model.scope_filter(name).ok_or_else(|| {
            OrmError::Configuration(format!(
                "Scope \"{name}\" is not defined for {} model",
                self.model.name()
            ))
        })?;
        self.filter.merge(&sub);
        if sub.limit.is_some() {
            self.filter.limit = sub.limit;
        }
        if sub.skip.is_some() {
            self.filter.skip = sub.skip;
        }
        self.name = format!("{}.{name}", self.name);
        Ok(self)
    }

    /// Cached records, querying on first access.
    pub fn get(&mut self) -> OrmResult<Vec<Instance>> {
        self.fetch(false)
    }

    pub fn fetch(&mut self, refresh: bool) -> OrmResult<Vec<Instance>> {
        if !refresh {
            if let Some(Related::Many(items)) =
                self.owner.as_deref().and_then(|owner| owner.cached(&self.name))
            {
                return Ok(items.clone());
            }
        }
        let items = self.query(&self.filter)?;
        if let Some(owner) = self.owner.as_deref_mut() {
            owner.cache(&self.name, Related::Many(items.clone()));
        }
        Ok(items)
    }

    /// Query with extra conditions, which override the scope's own on the
    /// same keys. Always hits storage and never touches the cache.
    pub fn with(&self, conditions: &Where) -> OrmResult<Vec<Instance>> {
        let mut filter = self.filter.clone();
        filter.where_.merge(conditions);
        self.query(&filter)
    }

    pub fn count(&self) -> OrmResult<usize> {
        match self.through() {
            Some(_) => Ok(self.query(&self.filter)?.len()),
            None => self.model.count(&self.filter.where_),
        }
    }

    /// Unsaved target record carrying the scope's equality conditions.
    pub fn build(&self, data: Row) -> OrmResult<Instance> {
        let mut row = self.filter.where_.equalities();
        row.extend(data);
        self.model.build(row)
    }

    /// Build and save. For a through relation the join record is created
    /// afterwards and the new record destroyed again if that fails.
    pub fn create(&mut self, data: Row) -> OrmResult<Instance> {
        let mut instance = self.build(data)?;
        instance.save()?;
        if let Some((join, key_through)) = self.through() {
            let relation = self.relation_ref()?;
            let link = crate::row! {
                relation.key_to.as_str() => self.owner_key.clone(),
                key_through.as_str() => instance.id(),
            };
            if let Err(e) = join.create(link) {
                warn!(
                    "{}: linking #{} failed, rolling back: {e}",
                    self.name,
                    instance.id()
                );
                if let Err(rollback) = instance.destroy() {
                    warn!("{}: rollback failed: {rollback}", self.name);
                }
                return Err(e);
            }
        }
        self.invalidate();
        Ok(instance)
    }

    /// Destroy every record currently in scope. All are attempted; the first
    /// failure is reported.
    pub fn destroy_all(&mut self) -> OrmResult<()> {
        let items = self.query(&self.filter)?;
        self.invalidate();
        let mut first_error = None;
        for mut item in items {
            if let Err(e) = item.destroy() {
                warn!("{}: destroying #{} failed: {e}", self.name, item.id());
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Record `id` if it is in scope; `NotFound` when it does not exist,
    /// `PermissionDenied` when it belongs elsewhere.
    pub fn find(&self, id: impl Into<Value>) -> OrmResult<Instance> {
        let id = id.into();
        let found = self.model.find(id.clone())?.ok_or_else(|| {
            OrmError::NotFound(format!("{} #{id} not found", self.model.name()))
        })?;
        let denied = || OrmError::PermissionDenied(format!("Permission denied: {} #{id}", self.model.name()));
        if !self.filter.where_.matches(&found.to_object(false, false)) {
            return Err(denied());
        }
        if let Some((join, key_through)) = self.through() {
            let relation = self.relation_ref()?;
            let link = Filter::new()
                .where_eq(relation.key_to.clone(), self.owner_key.clone())
                .where_eq(key_through, id.clone());
            if join.find_one(&link)?.is_none() {
                return Err(denied());
            }
        }
        Ok(found)
    }

    /// Find `id` within the scope and destroy it.
    pub fn destroy(&mut self, id: impl Into<Value>) -> OrmResult<()> {
        if self.through().is_some() {
            return Err(OrmError::Configuration(format!(
                "`{}` links through a join model; use remove",
                self.name
            )));
        }
        let mut found = self.find(id)?;
        found.destroy()?;
        self.invalidate();
        Ok(())
    }

    /// Link `target` through the join model. Linking twice is a no-op.
    pub fn add(&mut self, target: &Instance) -> OrmResult<Instance> {
        let (join, key_through) = self.require_through("add")?;
        let relation = self.relation_ref()?;
        let link = Filter::new()
            .where_eq(relation.key_to.clone(), self.owner_key.clone())
            .where_eq(key_through, target.id());
        let joined = join.find_or_create(&link, None)?;
        self.invalidate();
        Ok(joined)
    }

    /// Unlink `target`. Returns whether a link existed.
    pub fn remove(&mut self, target: &Instance) -> OrmResult<bool> {
        let (join, key_through) = self.require_through("remove")?;
        let relation = self.relation_ref()?;
        let link = Filter::new()
            .where_eq(relation.key_to.clone(), self.owner_key.clone())
            .where_eq(key_through, target.id());
        let removed = match join.find_one(&link)? {
            Some(mut record) => {
                record.destroy()?;
                true
            }
            None => false,
        };
        self.invalidate();
        Ok(removed)
    }

    fn relation_ref(&self) -> OrmResult<&Relation> {
        self.relation.as_ref().ok_or_else(|| {
            OrmError::Configuration(format!("`{}` is not a relation scope", self.name))
        })
    }

    /// Join model and its key to the target, for through relations.
    fn through(&self) -> Option<(Model, String)> {
        match &self.relation.as_ref()?.kind {
            RelationKind::HasManyThrough {
                through,
                key_through,
                ..
            } => {
                let join = self.model.schema().find_model(through)?;
                Some((join, key_through.clone()))
            }
            _ => None,
        }
    }

    fn require_through(&self, operation: &str) -> OrmResult<(Model, String)> {
        self.through().ok_or_else(|| {
            OrmError::Configuration(format!(
                "`{operation}` needs a relation through a join model, `{}` is not one",
                self.name
            ))
        })
    }

    fn query(&self, filter: &Filter) -> OrmResult<Vec<Instance>> {
        let Some((join, _)) = self.through() else {
            return self.model.all(filter);
        };
        let relation = self.relation_ref()?;
        let RelationKind::HasManyThrough { collect, .. } = &relation.kind else {
            return self.model.all(filter);
        };

        let target = IncludeItem {
            relation: collect.clone(),
            where_: (!filter.where_.is_empty()).then(|| filter.where_.clone()),
            nested: filter.include.clone().unwrap_or_default(),
        };
        let links = Filter::new()
            .where_eq(relation.key_to.clone(), self.owner_key.clone())
            .include(target)
            .collect(collect.clone());
        let mut items = join.all(&links)?;

        if !filter.order.is_empty() {
            let mut keyed: Vec<(Row, Instance)> = items
                .into_iter()
                .map(|item| (item.to_object(false, false), item))
                .collect();
            keyed.sort_by(|(a, _), (b, _)| {
                filter
                    .order
                    .iter()
                    .map(|order| order.compare(a, b))
                    .find(|ord| ord.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            items = keyed.into_iter().map(|(_, item)| item).collect();
        }
        let skip = filter.skip.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(items.into_iter().skip(skip).take(limit).collect())
    }

    fn invalidate(&mut self) {
        let base = self.relation.as_ref().map(|relation| relation.name.clone());
        if let Some(owner) = self.owner.as_deref_mut() {
            owner.uncache(&self.name);
            if let Some(base) = base {
                owner.uncache(&base);
            }
        }
    }
}
