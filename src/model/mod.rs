//! Model classes and their instances.
//!
//! A [`Model`] is a cheap, clonable handle onto a definition registered in
//! a [`Schema`]. Definitions stay mutable after `define`: relations, rules,
//! hooks, scopes and extra properties can be added at any time and are seen
//! by every handle.

pub mod definition;
mod finders;
mod instance;
pub mod list;
mod persistence;
pub mod property;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

pub use definition::{Accessor, Getter, ModelDefinition, ModelSettings, Setter};
pub use finders::{BatchCreate, IterateOptions};
pub use instance::{Instance, Related};
pub use persistence::SaveOptions;
pub use property::{DefaultValue, Properties, PropertyDef, PropertyType};

use crate::error::{OrmError, OrmResult};
use crate::hooks::{Hook, HookContext, HookTable};
use crate::query::Filter;
use crate::schema::Schema;
use crate::traits::adapter::Adapter;
use crate::validation::Predicate;
use crate::value::Row;

use definition::PredicateEntry;

#[derive(Clone)]
pub struct Model {
    schema: Schema,
    definition: Arc<RwLock<ModelDefinition>>,
    name: Arc<str>,
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.definition, &other.definition)
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Model").field(&self.name).finish()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Model {
    pub(crate) fn new(schema: Schema, definition: Arc<RwLock<ModelDefinition>>) -> Self {
        let name = Arc::from(
            definition
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .name
                .as_str(),
        );
        Self {
            schema,
            definition,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn definition(&self) -> RwLockReadGuard<'_, ModelDefinition> {
        self.definition.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn definition_mut(&self) -> RwLockWriteGuard<'_, ModelDefinition> {
        self.definition.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current definition.
    pub fn describe(&self) -> ModelDefinition {
        self.definition().clone()
    }

    pub(crate) fn adapter(&self) -> OrmResult<&dyn Adapter> {
        self.schema.adapter()
    }

    pub fn id_name(&self) -> String {
        self.definition().id_name.clone()
    }

    pub fn properties(&self) -> Properties {
        self.definition().properties.clone()
    }

    pub fn property(&self, name: &str) -> Option<PropertyDef> {
        self.definition().properties.get(name).cloned()
    }

    pub fn property_names(&self) -> Vec<String> {
        self.definition().properties.keys().cloned().collect()
    }

    pub fn settings(&self) -> ModelSettings {
        self.definition().settings.clone()
    }

    /// Add or replace a property after definition.
    pub fn define_property(&self, name: &str, def: impl Into<PropertyDef>) -> OrmResult<()> {
        let descriptor = {
            let mut definition = self.definition_mut();
            definition.properties.insert(name.to_string(), def.into());
            definition.descriptor()
        };
        debug!("{}: defined property `{name}`", self.name);
        self.schema.adapter_unchecked().define(&descriptor)?;
        Ok(())
    }

    /// REST resource location configured in the model settings.
    pub fn resource_url(&self) -> OrmResult<String> {
        self.definition()
            .settings
            .resource_url
            .clone()
            .ok_or_else(|| {
                OrmError::Configuration(format!("Resource url ({}) is not defined", self.name))
            })
    }

    pub fn define_accessor(&self, attr: &str, accessor: Accessor) {
        self.definition_mut()
            .accessors
            .insert(attr.to_string(), accessor);
    }

    pub(crate) fn getter(&self, attr: &str) -> Option<Getter> {
        self.definition()
            .accessors
            .get(attr)
            .and_then(|a| a.getter.clone())
    }

    pub(crate) fn setter(&self, attr: &str) -> Option<Setter> {
        self.definition()
            .accessors
            .get(attr)
            .and_then(|a| a.setter.clone())
    }

    /// Register a named boolean method, usable from `if`/`unless`.
    pub fn define_predicate<F>(&self, name: &str, test: F)
    where
        F: Fn(&Instance) -> bool + Send + Sync + 'static,
    {
        self.definition_mut()
            .predicates
            .insert(name.to_string(), PredicateEntry(Arc::new(test)));
    }

    pub fn predicate(&self, name: &str) -> Option<Predicate> {
        self.definition().predicates.get(name).map(|p| p.0.clone())
    }

    /// Install the function for one hook slot, replacing any previous one.
    pub fn hook<F>(&self, hook: Hook, f: F)
    where
        F: Fn(&mut HookContext<'_>) -> OrmResult<()> + Send + Sync + 'static,
    {
        self.definition_mut().hooks.set(hook, Arc::new(f));
    }

    pub fn remove_hook(&self, hook: Hook) {
        self.definition_mut().hooks.clear(hook);
    }

    pub(crate) fn hooks(&self) -> HookTable {
        self.definition().hooks.clone()
    }

    pub(crate) fn scope_filter(&self, name: &str) -> Option<Filter> {
        self.definition().scopes.get(name).cloned()
    }

    /// Property names -> storage column names.
    pub(crate) fn to_storage(&self, row: Row) -> Row {
        let definition = self.definition();
        row.into_iter()
            .map(|(key, value)| match definition.properties.get(&key) {
                Some(def) => (def.storage_name(&key).to_string(), value),
                None => (key, value),
            })
            .collect()
    }

    /// Storage column names -> property names.
    pub(crate) fn from_storage(&self, row: Row) -> Row {
        let definition = self.definition();
        let renamed: Vec<(&str, &str)> = definition
            .properties
            .iter()
            .filter_map(|(name, def)| def.column.as_deref().map(|column| (column, name.as_str())))
            .collect();
        if renamed.is_empty() {
            return row;
        }
        row.into_iter()
            .map(|(key, value)| {
                match renamed.iter().find(|(column, _)| *column == key) {
                    Some((_, name)) => (name.to_string(), value),
                    None => (key, value),
                }
            })
            .collect()
    }

    /// Rewrite `where` and `order` keys to storage columns and drop the
    /// engine-side parts of the filter.
    pub(crate) fn storage_filter(&self, filter: &Filter) -> Filter {
        let definition = self.definition();
        let column = |key: &str| {
            definition
                .properties
                .get(key)
                .map(|def| def.storage_name(key).to_string())
                .unwrap_or_else(|| key.to_string())
        };
        let mut out = Filter {
            where_: Default::default(),
            order: filter.order.clone(),
            limit: filter.limit,
            skip: filter.skip,
            include: None,
            collect: None,
            attributes: None,
        };
        for (key, condition) in filter.where_.iter() {
            out.where_.insert(column(key), condition.clone());
        }
        for order in &mut out.order {
            order.property = column(&order.property);
        }
        out
    }
}
