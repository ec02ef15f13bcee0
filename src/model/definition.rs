//! Per-model registry entry.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use typed_builder::TypedBuilder;

use crate::hooks::HookTable;
use crate::model::Instance;
use crate::model::property::{Properties, PropertyDef, PropertyType};
use crate::query::Filter;
use crate::relational::Relation;
use crate::traits::adapter::ModelDescriptor;
use crate::validation::{Predicate, ValidationRule};
use crate::value::Value;

pub type Getter = Arc<dyn Fn(&Instance) -> Value + Send + Sync>;
pub type Setter = Arc<dyn Fn(&mut Instance, Value) + Send + Sync>;

/// Custom getter and/or setter for one attribute. Inside them use
/// [`Instance::raw`] and [`Instance::set_raw`] to reach the stored value.
#[derive(Clone, Default)]
pub struct Accessor {
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
}

impl Accessor {
    pub fn getter<F>(get: F) -> Self
    where
        F: Fn(&Instance) -> Value + Send + Sync + 'static,
    {
        Self {
            getter: Some(Arc::new(get)),
            setter: None,
        }
    }

    pub fn setter<F>(set: F) -> Self
    where
        F: Fn(&mut Instance, Value) + Send + Sync + 'static,
    {
        Self {
            getter: None,
            setter: Some(Arc::new(set)),
        }
    }

    pub fn with_setter<F>(mut self, set: F) -> Self
    where
        F: Fn(&mut Instance, Value) + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(set));
        self
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

/// Model-level settings.
#[derive(Debug, Clone, Default, TypedBuilder)]
#[builder(doc)]
pub struct ModelSettings {
    /// Storage table/collection name, defaults to the model name
    #[builder(default, setter(strip_option, into))]
    pub table: Option<String>,

    /// Base URL of the model's REST resource
    #[builder(default, setter(strip_option, into))]
    pub resource_url: Option<String>,
}

/// Everything registered for one model: properties, relations, rules,
/// hooks, named scopes, accessors and predicates.
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    pub(crate) name: String,
    pub(crate) properties: Properties,
    pub(crate) settings: ModelSettings,
    pub(crate) id_name: String,
    pub(crate) relations: IndexMap<String, Relation>,
    pub(crate) validations: Vec<ValidationRule>,
    pub(crate) hooks: HookTable,
    pub(crate) scopes: IndexMap<String, Filter>,
    pub(crate) accessors: IndexMap<String, Accessor>,
    pub(crate) predicates: IndexMap<String, PredicateEntry>,
}

#[derive(Clone)]
pub(crate) struct PredicateEntry(pub(crate) Predicate);

impl fmt::Debug for PredicateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

impl ModelDefinition {
    /// The identity property is the one flagged `id`, else an implicit
    /// numeric `id` placed first.
    pub(crate) fn new(name: &str, properties: Properties, settings: ModelSettings) -> Self {
        let id_name = properties.id_property().unwrap_or("id").to_string();
        let properties = if properties.contains_key(&id_name) {
            properties
        } else {
            let id = PropertyDef::builder().kind(PropertyType::Number).id(true).build();
            std::iter::once((id_name.clone(), id))
                .chain(properties.iter().map(|(k, v)| (k.clone(), v.clone())))
                .collect()
        };
        Self {
            name: name.to_string(),
            properties,
            settings,
            id_name,
            relations: IndexMap::new(),
            validations: Vec::new(),
            hooks: HookTable::default(),
            scopes: IndexMap::new(),
            accessors: IndexMap::new(),
            predicates: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_name(&self) -> &str {
        &self.id_name
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn relations(&self) -> &IndexMap<String, Relation> {
        &self.relations
    }

    pub(crate) fn descriptor(&self) -> ModelDescriptor {
        ModelDescriptor {
            model: self.name.clone(),
            table: self.settings.table.clone().unwrap_or_else(|| self.name.clone()),
            id_name: self.id_name.clone(),
            properties: self.properties.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_identity_comes_first() {
        let def = ModelDefinition::new(
            "Post",
            Properties::new().with("title", PropertyType::String),
            ModelSettings::default(),
        );
        assert_eq!(def.id_name(), "id");
        assert_eq!(def.properties().keys().next().map(String::as_str), Some("id"));
    }

    #[test]
    fn explicit_identity_is_kept() {
        let def = ModelDefinition::new(
            "Account",
            Properties::new()
                .with("email", PropertyDef::builder().kind(PropertyType::String).id(true).build()),
            ModelSettings::builder().table("accounts").build(),
        );
        assert_eq!(def.id_name(), "email");
        assert_eq!(def.properties().len(), 1);
        assert_eq!(def.descriptor().table, "accounts");
    }
}
