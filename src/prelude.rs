//! Prelude module for convenient imports.
//!
//! ```
//! use netabase_orm::prelude::*;
//! ```
//!
//! Brings in the schema and model handles, property and query types,
//! relation and hook types, the error types and the [`row!`] macro.
//! Adapter implementations and configuration structs stay in their
//! modules.

// Schema and models
pub use crate::model::{
    Accessor, BatchCreate, DefaultValue, Instance, IterateOptions, Model, ModelSettings,
    Properties, PropertyDef, PropertyType, Related, SaveOptions,
};
pub use crate::schema::Schema;

// Values and queries
pub use crate::query::{
    Attributes, Filter, FilterValue, IncludeItem, IncludeSpec, Order, Where,
};
pub use crate::value::{Row, Value};

// Relations and scopes
pub use crate::relational::{Relation, RelationArg, RelationKind, RelationOptions};
pub use crate::scope::Scope;

// Lifecycle
pub use crate::hooks::{Hook, HookContext};
pub use crate::validation::{Condition, LengthRule, Reporter, RuleConfig, Validation};

// Error handling
pub use crate::callback::Completion;
pub use crate::error::{OrmError, OrmResult, ValidationError};

pub use crate::row;
