//! Property declarations and type coercion.

use std::fmt;
use std::sync::Arc;

use derive_more::{Deref, DerefMut};
use indexmap::IndexMap;
use typed_builder::TypedBuilder;

use crate::model::list::List;
use crate::utils::datetime;
use crate::value::Value;

/// Declared type of a property.
#[derive(Debug, Clone, PartialEq, Eq, Default, strum::Display, strum::AsRefStr)]
pub enum PropertyType {
    String,
    Text,
    Number,
    Boolean,
    Date,
    Json,
    /// Ordered list of items of the inner type.
    List(Box<PropertyType>),
    #[default]
    Any,
}

impl PropertyType {
    pub fn list_of(item: PropertyType) -> Self {
        PropertyType::List(Box::new(item))
    }

    /// Base types hold scalars and are never parsed from JSON text.
    pub fn is_base(&self) -> bool {
        !matches!(self, PropertyType::Json | PropertyType::List(_))
    }

    /// Coerce an assigned or loaded value into this type.
    ///
    /// Booleans treat the string `"false"` as false and everything else by
    /// truthiness; dates go through [`datetime::coerce`]; JSON and list types
    /// parse string input, keeping the string when it is not valid JSON.
    pub fn coerce(&self, value: Value) -> Value {
        match self {
            PropertyType::Boolean => match value {
                Value::Null => Value::Null,
                Value::String(s) if s == "false" => Value::Bool(false),
                other => Value::Bool(other.truthy()),
            },
            PropertyType::Date => datetime::coerce(value),
            PropertyType::Json => parse_json_text(value),
            PropertyType::List(_) => match parse_json_text(value) {
                Value::Null => Value::Null,
                Value::List(list) => Value::List(list),
                Value::Array(items) => Value::List(List::from_items(items)),
                other => Value::List(List::from_items(vec![other])),
            },
            _ => value,
        }
    }
}

fn parse_json_text(value: Value) -> Value {
    match value {
        Value::String(text) => match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json) => Value::from_json(json),
            Err(_) => Value::String(text),
        },
        other => other,
    }
}

/// Static or generated default of a property.
#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    Generated(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn value(value: impl Into<Value>) -> Self {
        DefaultValue::Static(value.into())
    }

    pub fn with<F>(generate: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        DefaultValue::Generated(Arc::new(generate))
    }

    pub fn resolve(&self) -> Value {
        match self {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Generated(generate) => generate(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Generated(_) => f.write_str("Generated(..)"),
        }
    }
}

/// One property of a model.
///
/// ```
/// use netabase_orm::model::property::{DefaultValue, PropertyDef, PropertyType};
///
/// let def = PropertyDef::builder()
///     .kind(PropertyType::Boolean)
///     .default(DefaultValue::value(false))
///     .index(true)
///     .build();
/// assert!(def.index);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
#[builder(doc)]
pub struct PropertyDef {
    #[builder(default)]
    pub kind: PropertyType,

    #[builder(default, setter(strip_option))]
    pub default: Option<DefaultValue>,

    /// Hint for adapters that maintain secondary indexes
    #[builder(default = false)]
    pub index: bool,

    /// Storage column name when it differs from the property name
    #[builder(default, setter(strip_option, into))]
    pub column: Option<String>,

    /// Marks the identity property
    #[builder(default = false)]
    pub id: bool,
}

impl PropertyDef {
    pub fn new(kind: PropertyType) -> Self {
        Self::builder().kind(kind).build()
    }

    pub fn default_value(&self) -> Option<Value> {
        self.default.as_ref().map(DefaultValue::resolve)
    }

    pub fn storage_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.column.as_deref().unwrap_or(name)
    }
}

impl From<PropertyType> for PropertyDef {
    fn from(kind: PropertyType) -> Self {
        PropertyDef::new(kind)
    }
}

/// Ordered property name -> definition map.
#[derive(Debug, Clone, Default, Deref, DerefMut)]
pub struct Properties(IndexMap<String, PropertyDef>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, def: impl Into<PropertyDef>) -> Self {
        self.0.insert(name.into(), def.into());
        self
    }

    /// Name of the property flagged as identity, if any.
    pub fn id_property(&self) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, def)| def.id)
            .map(|(name, _)| name.as_str())
    }
}

impl FromIterator<(String, PropertyDef)> for Properties {
    fn from_iter<I: IntoIterator<Item = (String, PropertyDef)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
