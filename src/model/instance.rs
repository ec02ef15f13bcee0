use std::fmt;

use indexmap::IndexMap;
use log::warn;
use serde::{Serialize, Serializer};

use crate::error::{OrmResult, ValidationError};
use crate::hooks::HookEvent;
use crate::model::Model;
use crate::relational::Relation;
use crate::validation::Errors;
use crate::value::{Row, Value};

/// A related record (or records) cached on an instance.
#[derive(Debug, Clone)]
pub enum Related {
    One(Option<Box<Instance>>),
    Many(Vec<Instance>),
}

impl Related {
    pub fn one(&self) -> Option<&Instance> {
        match self {
            Related::One(one) => one.as_deref(),
            Related::Many(_) => None,
        }
    }

    pub fn many(&self) -> &[Instance] {
        match self {
            Related::Many(items) => items,
            Related::One(_) => &[],
        }
    }

    pub fn into_one(self) -> Option<Instance> {
        match self {
            Related::One(one) => one.map(|boxed| *boxed),
            Related::Many(_) => None,
        }
    }

    pub fn into_many(self) -> Vec<Instance> {
        match self {
            Related::Many(items) => items,
            Related::One(one) => one.map(|boxed| vec![*boxed]).unwrap_or_default(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Related::One(None) => Value::Null,
            Related::One(Some(instance)) => Value::Object(instance.to_object(false, true)),
            Related::Many(items) => Value::Array(
                items
                    .iter()
                    .map(|i| Value::Object(i.to_object(false, true)))
                    .collect(),
            ),
        }
    }
}

/// One record of a model: current data, the snapshot taken at the last
/// load or persist, cached relations and the last validation errors.
#[derive(Clone)]
pub struct Instance {
    model: Model,
    pub(crate) data: Row,
    pub(crate) data_was: Row,
    pub(crate) cached: IndexMap<String, Related>,
    pub(crate) errors: Option<Errors>,
    pub(crate) rev: Option<Value>,
    pub(crate) id_locked: bool,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.model.name())
            .field("data", &self.data)
            .field("cached", &self.cached.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Serialize for Instance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_object(false, true).serialize(serializer)
    }
}

impl Instance {
    fn empty(model: Model) -> Self {
        Self {
            model,
            data: Row::new(),
            data_was: Row::new(),
            cached: IndexMap::new(),
            errors: None,
            rev: None,
            id_locked: false,
        }
    }

    /// New instance from user data: custom setters and coercion apply and
    /// unknown keys become dynamic fields.
    pub(crate) fn build(model: &Model, data: Row) -> OrmResult<Self> {
        let mut instance = Self::empty(model.clone());
        instance.init_properties(data, true)?;
        instance.initialized()?;
        Ok(instance)
    }

    /// Instance from a row read back from storage (already keyed by
    /// property name). Unknown columns are dropped and the identity is
    /// locked.
    pub(crate) fn hydrate(model: &Model, row: Row) -> OrmResult<Self> {
        let mut instance = Self::empty(model.clone());
        instance.init_properties(row, false)?;
        instance.id_locked = !instance.id().is_null();
        instance.initialized()?;
        Ok(instance)
    }

    fn initialized(&mut self) -> OrmResult<()> {
        let hooks = self.model.hooks();
        hooks.after(HookEvent::Initialize, self, None)
    }

    fn init_properties(&mut self, data: Row, apply_setters: bool) -> OrmResult<()> {
        let (properties, relations) = {
            let def = self.model.definition();
            (def.properties.clone(), def.relations.clone())
        };
        self.data.clear();
        self.data_was.clear();
        self.cached.clear();

        let mut assigned = Vec::new();
        for (key, value) in data {
            if let Some(def) = properties.get(&key) {
                self.data.insert(key.clone(), def.kind.coerce(value.clone()));
            } else if let Some(relation) = relations.get(&key) {
                self.cache_raw_relation(relation, value)?;
                continue;
            }
            if apply_setters {
                assigned.push((key, value));
            }
        }
        for (key, value) in assigned {
            self.set(&key, value);
        }
        for (name, def) in properties.iter() {
            if !self.data.contains_key(name) {
                let value = def.default_value().unwrap_or_default();
                self.data.insert(name.clone(), def.kind.coerce(value));
            }
        }
        self.data_was = self.data.clone();
        Ok(())
    }

    /// A raw row may embed related records under a relation's name; keep
    /// them as cached relations and copy the foreign key.
    fn cache_raw_relation(&mut self, relation: &Relation, value: Value) -> OrmResult<()> {
        let target = self.model.schema().model(&relation.model_to)?;
        match (relation.multiple, value) {
            (false, Value::Object(row)) => {
                let related = Instance::hydrate(&target, target.from_storage(row))?;
                self.data
                    .insert(relation.key_from.clone(), related.get(&relation.key_to));
                self.cached
                    .insert(relation.name.clone(), Related::One(Some(Box::new(related))));
            }
            (true, Value::Array(items)) => {
                let mut related = Vec::with_capacity(items.len());
                for item in items {
                    if let Value::Object(row) = item {
                        related.push(Instance::hydrate(&target, target.from_storage(row))?);
                    }
                }
                self.cached.insert(relation.name.clone(), Related::Many(related));
            }
            _ => {}
        }
        Ok(())
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Value of an attribute, through its custom getter if one is defined.
    pub fn get(&self, attr: &str) -> Value {
        match self.model.getter(attr) {
            Some(getter) => getter(self),
            None => self.raw(attr),
        }
    }

    /// Stored value of an attribute, bypassing custom getters.
    pub fn raw(&self, attr: &str) -> Value {
        self.data.get(attr).cloned().unwrap_or_default()
    }

    /// Assign an attribute. Declared properties are coerced to their type;
    /// a locked identity is left untouched.
    pub fn set(&mut self, attr: &str, value: impl Into<Value>) {
        let value = value.into();
        if let Some(setter) = self.model.setter(attr) {
            setter(self, value);
            return;
        }
        let value = match self.model.property(attr) {
            Some(def) => def.kind.coerce(value),
            None => value,
        };
        self.set_raw(attr, value);
    }

    /// Store a value as-is, bypassing setters and coercion.
    pub fn set_raw(&mut self, attr: &str, value: impl Into<Value>) {
        if self.id_locked && attr == self.model.id_name() {
            warn!(
                "{}: ignoring write to read-only identity `{attr}`",
                self.model.name()
            );
            return;
        }
        self.data.insert(attr.to_string(), value.into());
    }

    pub fn set_attributes(&mut self, data: Row) {
        for (key, value) in data {
            self.set(&key, value);
        }
    }

    pub fn id(&self) -> Value {
        self.raw(&self.model.id_name())
    }

    pub(crate) fn assign_identity(&mut self, id: Value) {
        if !id.is_null() {
            let id_name = self.model.id_name();
            self.data.insert(id_name.clone(), id.clone());
            self.data_was.insert(id_name, id);
        }
        self.id_locked = !self.id().is_null();
    }

    pub fn is_new_record(&self) -> bool {
        self.id().is_null()
    }

    /// Revision metadata returned by the adapter on create, if any.
    pub fn rev(&self) -> Option<&Value> {
        self.rev.as_ref()
    }

    pub fn property_changed(&self, attr: &str) -> bool {
        self.data.get(attr).unwrap_or(&Value::Null) != self.data_was.get(attr).unwrap_or(&Value::Null)
    }

    /// Value at the last load or persist.
    pub fn was(&self, attr: &str) -> Value {
        self.data_was.get(attr).cloned().unwrap_or_default()
    }

    pub fn changed_properties(&self) -> Vec<String> {
        self.data
            .keys()
            .chain(self.data_was.keys().filter(|k| !self.data.contains_key(*k)))
            .filter(|k| self.property_changed(k))
            .cloned()
            .collect()
    }

    /// Mark the current data as persisted.
    pub(crate) fn sync(&mut self) {
        self.data_was = self.data.clone();
    }

    pub fn errors(&self) -> Option<&Errors> {
        self.errors.as_ref()
    }

    pub(crate) fn validation_error(&self) -> ValidationError {
        ValidationError::new(self.model.name(), self.errors.clone().unwrap_or_default())
    }

    pub fn cached(&self, relation: &str) -> Option<&Related> {
        self.cached.get(relation)
    }

    pub(crate) fn cache(&mut self, relation: &str, related: Related) {
        self.cached.insert(relation.to_string(), related);
    }

    pub(crate) fn uncache(&mut self, relation: &str) {
        self.cached.shift_remove(relation);
    }

    /// Plain-data view: every declared property (missing ones as null),
    /// dynamic fields unless `only_schema`, and cached relations when
    /// `with_cached` is set.
    pub fn to_object(&self, only_schema: bool, with_cached: bool) -> Row {
        let properties = self.model.property_names();
        let mut out = Row::with_capacity(self.data.len());
        for name in &properties {
            out.insert(name.clone(), self.raw(name));
        }
        if !only_schema {
            for (key, value) in &self.data {
                if !out.contains_key(key) {
                    out.insert(key.clone(), value.clone());
                }
            }
        }
        if with_cached {
            // chained scope results ("posts.published") are not relations
            for (name, related) in &self.cached {
                if !name.contains('.') && !out.contains_key(name) {
                    out.insert(name.clone(), related.to_value());
                }
            }
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.to_object(false, true)).to_json()
    }
}
