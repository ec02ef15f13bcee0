//! Query filters passed from the engine to adapters.
//!
//! A [`Filter`] is the typed form of the classic
//! `{where, order, limit, skip, include, collect}` object. Operator
//! conditions are parsed once into [`FilterValue`] so no backend has to
//! sniff value shapes at runtime.
//!
//! ```
//! use netabase_orm::query::{Filter, FilterValue};
//! use netabase_orm::value::Value;
//!
//! let filter = Filter::new()
//!     .where_eq("published", true)
//!     .condition("views", FilterValue::gt(100))
//!     .order_by("createdAt DESC")
//!     .limit(10)
//!     .offset(20);
//!
//! assert_eq!(filter.skip, Some(20));
//! assert!(filter.order[0].descending);
//! assert_eq!(filter.where_.get("published"), Some(&FilterValue::Equals(Value::Bool(true))));
//! ```

use std::cmp::Ordering;
use std::fmt;

use derive_more::{Deref, DerefMut};
use indexmap::IndexMap;

use crate::error::{OrmError, OrmResult};
use crate::value::{Row, Value};

/// A compiled regular expression usable as a `where` operand.
#[derive(Clone)]
pub struct Pattern(regex::Regex);

impl Pattern {
    pub fn new(pattern: &str) -> OrmResult<Self> {
        regex::Regex::new(pattern)
            .map(Pattern)
            .map_err(|e| OrmError::Configuration(format!("invalid pattern `{pattern}`: {e}")))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.0.as_str())
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Range bounds of a `{gt, gte, lt, lte}` condition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bounds {
    pub gt: Option<Value>,
    pub gte: Option<Value>,
    pub lt: Option<Value>,
    pub lte: Option<Value>,
}

/// One `where` condition.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Equals(Value),
    Range(Bounds),
    Between(Value, Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Not(Value),
    Regex(Pattern),
}

impl FilterValue {
    pub fn gt(v: impl Into<Value>) -> Self {
        FilterValue::Range(Bounds {
            gt: Some(v.into()),
            ..Bounds::default()
        })
    }

    pub fn gte(v: impl Into<Value>) -> Self {
        FilterValue::Range(Bounds {
            gte: Some(v.into()),
            ..Bounds::default()
        })
    }

    pub fn lt(v: impl Into<Value>) -> Self {
        FilterValue::Range(Bounds {
            lt: Some(v.into()),
            ..Bounds::default()
        })
    }

    pub fn lte(v: impl Into<Value>) -> Self {
        FilterValue::Range(Bounds {
            lte: Some(v.into()),
            ..Bounds::default()
        })
    }

    pub fn inq<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        FilterValue::In(values.into_iter().map(Into::into).collect())
    }

    /// Whether a stored value satisfies this condition. Equality is loose:
    /// values compare by their string form.
    pub fn matches(&self, candidate: &Value) -> bool {
        match self {
            FilterValue::Equals(Value::Null) => candidate.is_null(),
            FilterValue::Equals(expected) => expected.loose_eq(candidate),
            FilterValue::Not(expected) => !expected.loose_eq(candidate),
            FilterValue::In(values) => {
                !candidate.is_null() && values.iter().any(|v| v.loose_eq(candidate))
            }
            FilterValue::NotIn(values) => !values.iter().any(|v| v.loose_eq(candidate)),
            FilterValue::Regex(pattern) => candidate.as_str().is_some_and(|s| pattern.is_match(s)),
            FilterValue::Between(low, high) => {
                !candidate.is_null()
                    && matches!(candidate.compare(low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(candidate.compare(high), Some(Ordering::Less | Ordering::Equal))
            }
            FilterValue::Range(bounds) => {
                if candidate.is_null() {
                    return false;
                }
                let check = |bound: &Option<Value>, accept: &[Ordering]| {
                    bound.as_ref().is_none_or(|b| {
                        candidate.compare(b).is_some_and(|ord| accept.contains(&ord))
                    })
                };
                check(&bounds.gt, &[Ordering::Greater])
                    && check(&bounds.gte, &[Ordering::Greater, Ordering::Equal])
                    && check(&bounds.lt, &[Ordering::Less])
                    && check(&bounds.lte, &[Ordering::Less, Ordering::Equal])
            }
        }
    }

    /// The plain value of an equality condition.
    pub fn as_equals(&self) -> Option<&Value> {
        match self {
            FilterValue::Equals(v) => Some(v),
            _ => None,
        }
    }

    fn from_json(json: &serde_json::Value) -> OrmResult<Self> {
        let Some(object) = json.as_object() else {
            return Ok(FilterValue::Equals(Value::from_json(json.clone())));
        };
        const OPERATORS: [&str; 9] = [
            "gt", "gte", "lt", "lte", "between", "inq", "nin", "neq", "regexp",
        ];
        if object.is_empty() || !object.keys().all(|k| OPERATORS.contains(&k.as_str())) {
            return Ok(FilterValue::Equals(Value::from_json(json.clone())));
        }

        let scalar = |key: &str| object.get(key).cloned().map(Value::from_json);
        let list = |key: &str| -> OrmResult<Option<Vec<Value>>> {
            match object.get(key) {
                None => Ok(None),
                Some(serde_json::Value::Array(items)) => {
                    Ok(Some(items.iter().cloned().map(Value::from_json).collect()))
                }
                Some(other) => Err(OrmError::Configuration(format!(
                    "`{key}` expects an array, got {other}"
                ))),
            }
        };

        if let Some(values) = list("inq")? {
            return Ok(FilterValue::In(values));
        }
        if let Some(values) = list("nin")? {
            return Ok(FilterValue::NotIn(values));
        }
        if let Some(values) = list("between")? {
            let [low, high]: [Value; 2] = values.try_into().map_err(|_| {
                OrmError::Configuration("`between` expects exactly two values".to_string())
            })?;
            return Ok(FilterValue::Between(low, high));
        }
        if let Some(value) = scalar("neq") {
            return Ok(FilterValue::Not(value));
        }
        if let Some(pattern) = object.get("regexp") {
            let text = pattern.as_str().ok_or_else(|| {
                OrmError::Configuration("`regexp` expects a string pattern".to_string())
            })?;
            return Ok(FilterValue::Regex(Pattern::new(text)?));
        }
        Ok(FilterValue::Range(Bounds {
            gt: scalar("gt"),
            gte: scalar("gte"),
            lt: scalar("lt"),
            lte: scalar("lte"),
        }))
    }
}

/// Property -> condition map. Keys are AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Deref, DerefMut)]
pub struct Where(IndexMap<String, FilterValue>);

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), FilterValue::Equals(value.into()));
        self
    }

    pub fn cond(mut self, key: impl Into<String>, condition: FilterValue) -> Self {
        self.0.insert(key.into(), condition);
        self
    }

    /// Overwrite conditions key by key with those of `update`.
    pub fn merge(&mut self, update: &Where) {
        for (key, condition) in update.iter() {
            self.0.insert(key.clone(), condition.clone());
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.0
            .iter()
            .all(|(key, condition)| condition.matches(row.get(key).unwrap_or(&Value::Null)))
    }

    /// Plain equality values, usable as initial instance data.
    pub fn equalities(&self) -> Row {
        self.0
            .iter()
            .filter_map(|(k, c)| c.as_equals().map(|v| (k.clone(), v.clone())))
            .collect()
    }

    pub fn from_json(json: &serde_json::Value) -> OrmResult<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| OrmError::Configuration(format!("`where` must be an object, got {json}")))?;
        let mut conditions = Where::new();
        for (key, value) in object {
            conditions.0.insert(key.clone(), FilterValue::from_json(value)?);
        }
        Ok(conditions)
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub property: String,
    pub descending: bool,
}

impl Order {
    /// Parse `"prop"`, `"prop ASC"` or `"prop DESC"` (case-insensitive).
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        let mut parts = spec.rsplitn(2, char::is_whitespace);
        let last = parts.next().unwrap_or_default();
        match parts.next() {
            Some(property) if last.eq_ignore_ascii_case("desc") => Order {
                property: property.trim().to_string(),
                descending: true,
            },
            Some(property) if last.eq_ignore_ascii_case("asc") => Order {
                property: property.trim().to_string(),
                descending: false,
            },
            _ => Order {
                property: spec.to_string(),
                descending: false,
            },
        }
    }

    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let left = a.get(&self.property).unwrap_or(&Value::Null);
        let right = b.get(&self.property).unwrap_or(&Value::Null);
        let ord = left.compare(right).unwrap_or(Ordering::Equal);
        if self.descending { ord.reverse() } else { ord }
    }
}

/// Projection requested through `attributes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attributes {
    Single(String),
    List(Vec<String>),
}

impl Attributes {
    pub fn allows(&self, key: &str) -> bool {
        match self {
            Attributes::Single(name) => name == key,
            Attributes::List(names) => names.iter().any(|n| n == key),
        }
    }
}

/// One relation to eager-load, with its own nested include and an optional
/// extra `where` (the populate flavour).
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeItem {
    pub relation: String,
    pub where_: Option<Where>,
    pub nested: IncludeSpec,
}

impl IncludeItem {
    pub fn new(relation: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            where_: None,
            nested: IncludeSpec::default(),
        }
    }

    pub fn nested(mut self, nested: impl Into<IncludeSpec>) -> Self {
        self.nested = nested.into();
        self
    }

    pub fn filtered(mut self, conditions: Where) -> Self {
        self.where_ = Some(conditions);
        self
    }
}

/// Normalized include specification: a flat list of include items.
#[derive(Debug, Clone, Default, PartialEq, Deref)]
pub struct IncludeSpec(Vec<IncludeItem>);

impl IncludeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, item: impl Into<IncludeItem>) -> Self {
        self.0.push(item.into());
        self
    }

    pub fn items(&self) -> &[IncludeItem] {
        &self.0
    }

    /// Accepts `"rel"`, `["a", {"b": "c"}]`, `{"a": ..., "b": ...}` and the
    /// populate form `{"a": {"where": {...}, "populate": ...}}`.
    pub fn from_json(json: &serde_json::Value) -> OrmResult<Self> {
        match json {
            serde_json::Value::Null => Ok(Self::default()),
            serde_json::Value::String(name) => Ok(Self(vec![IncludeItem::new(name.clone())])),
            serde_json::Value::Array(items) => {
                let mut spec = Self::default();
                for item in items {
                    spec.0.extend(Self::from_json(item)?.0);
                }
                Ok(spec)
            }
            serde_json::Value::Object(map) => {
                let mut spec = Self::default();
                for (relation, sub) in map {
                    spec.0.push(Self::item_from_json(relation, sub)?);
                }
                Ok(spec)
            }
            other => Err(OrmError::Configuration(format!(
                "unsupported include specification: {other}"
            ))),
        }
    }

    fn item_from_json(relation: &str, sub: &serde_json::Value) -> OrmResult<IncludeItem> {
        let mut item = IncludeItem::new(relation);
        let populate_form = sub
            .as_object()
            .is_some_and(|o| o.contains_key("where") || o.contains_key("populate"));
        if populate_form {
            if let Some(conditions) = sub.get("where") {
                item.where_ = Some(Where::from_json(conditions)?);
            }
            if let Some(nested) = sub.get("populate") {
                item.nested = Self::from_json(nested)?;
            }
        } else {
            item.nested = Self::from_json(sub)?;
        }
        Ok(item)
    }
}

impl From<&str> for IncludeItem {
    fn from(relation: &str) -> Self {
        IncludeItem::new(relation)
    }
}

impl From<&str> for IncludeSpec {
    fn from(relation: &str) -> Self {
        Self(vec![IncludeItem::new(relation)])
    }
}

impl From<IncludeItem> for IncludeSpec {
    fn from(item: IncludeItem) -> Self {
        Self(vec![item])
    }
}

impl From<Vec<&str>> for IncludeSpec {
    fn from(relations: Vec<&str>) -> Self {
        Self(relations.into_iter().map(IncludeItem::new).collect())
    }
}

impl From<Vec<IncludeItem>> for IncludeSpec {
    fn from(items: Vec<IncludeItem>) -> Self {
        Self(items)
    }
}

/// Typed query filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub where_: Where,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
    /// Rows to skip; `offset` is an alias.
    pub skip: Option<usize>,
    pub include: Option<IncludeSpec>,
    /// Replace each hydrated row by its cached relation of this name.
    pub collect: Option<String>,
    pub attributes: Option<Attributes>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_.insert(key.into(), FilterValue::Equals(value.into()));
        self
    }

    pub fn condition(mut self, key: impl Into<String>, condition: FilterValue) -> Self {
        self.where_.insert(key.into(), condition);
        self
    }

    pub fn with_where(mut self, conditions: Where) -> Self {
        self.where_ = conditions;
        self
    }

    /// Append a sort key such as `"name"` or `"createdAt DESC"`.
    pub fn order_by(mut self, spec: &str) -> Self {
        self.order.push(Order::parse(spec));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn offset(self, offset: usize) -> Self {
        self.skip(offset)
    }

    pub fn include(mut self, include: impl Into<IncludeSpec>) -> Self {
        self.include = Some(include.into());
        self
    }

    pub fn collect(mut self, relation: impl Into<String>) -> Self {
        self.collect = Some(relation.into());
        self
    }

    pub fn attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Fold `update` into this filter: `where` keys overwrite by key,
    /// `order`, `include` and `collect` replace when set.
    pub fn merge(&mut self, update: &Filter) {
        self.where_.merge(&update.where_);
        if update.include.is_some() {
            self.include = update.include.clone();
        }
        if update.collect.is_some() {
            self.collect = update.collect.clone();
        }
        if !update.order.is_empty() {
            self.order = update.order.clone();
        }
    }

    /// Parse the JSON-like filter object. `skip` and `offset` are aliases,
    /// `populate` is accepted in place of `include`.
    pub fn from_json(json: &serde_json::Value) -> OrmResult<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| OrmError::Configuration(format!("filter must be an object, got {json}")))?;
        let mut filter = Filter::new();
        if let Some(conditions) = object.get("where") {
            filter.where_ = Where::from_json(conditions)?;
        }
        match object.get("order") {
            Some(serde_json::Value::String(spec)) => {
                filter.order = spec.split(',').map(Order::parse).collect();
            }
            Some(serde_json::Value::Array(specs)) => {
                filter.order = specs.iter().filter_map(|s| s.as_str()).map(Order::parse).collect();
            }
            _ => {}
        }
        let count = |key: &str| object.get(key).and_then(serde_json::Value::as_u64).map(|n| n as usize);
        filter.limit = count("limit");
        filter.skip = count("skip").or_else(|| count("offset"));
        if let Some(include) = object.get("include").or_else(|| object.get("populate")) {
            filter.include = Some(IncludeSpec::from_json(include)?);
        }
        filter.collect = object
            .get("collect")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string);
        filter.attributes = match object.get("attributes") {
            Some(serde_json::Value::String(name)) => Some(Attributes::Single(name.clone())),
            Some(serde_json::Value::Array(names)) => Some(Attributes::List(
                names.iter().filter_map(|n| n.as_str()).map(str::to_string).collect(),
            )),
            _ => None,
        };
        Ok(filter)
    }
}
