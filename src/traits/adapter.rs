//! Storage adapter interface.
//!
//! An adapter stores rows (ordered `property -> Value` maps) per model and
//! answers typed [`Filter`] queries. The engine never touches storage any
//! other way, so any key-value or document store that can implement these
//! calls works as a backend.
//!
//! Optional operations have default bodies returning
//! [`AdapterError::Unsupported`]; [`Capabilities`] tells the engine which
//! of them it may call.

use crate::error::{AdapterError, AdapterResult};
use crate::model::property::{Properties, PropertyType};
use crate::query::{Filter, Where};
use crate::value::{Row, Value};

/// What an adapter learns about a model when it is defined.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub model: String,
    /// Storage table/collection name
    pub table: String,
    pub id_name: String,
    pub properties: Properties,
}

/// Result of an insert: the assigned identity and optional revision tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Created {
    pub id: Value,
    pub rev: Option<Value>,
}

impl Created {
    pub fn new(id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            rev: None,
        }
    }
}

/// Optional operations an adapter implements natively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub exists: bool,
    pub update_or_create: bool,
    pub migrations: bool,
}

pub(crate) fn unsupported(adapter: &'static str, operation: &'static str) -> AdapterError {
    AdapterError::Unsupported { adapter, operation }
}

/// The storage contract.
///
/// Implementations must be shareable across threads; interior mutability
/// is the implementation's business.
pub trait Adapter: Send + Sync {
    /// Short adapter name used in logs and errors.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn connect(&self) -> AdapterResult<()> {
        Ok(())
    }

    fn disconnect(&self) -> AdapterResult<()> {
        Ok(())
    }

    /// Called for every model definition and property change.
    fn define(&self, descriptor: &ModelDescriptor) -> AdapterResult<()>;

    /// Insert a row. A null identity means "assign one".
    fn create(&self, model: &str, data: &Row) -> AdapterResult<Created>;

    /// Write a full row keyed by its identity.
    fn save(&self, model: &str, data: &Row) -> AdapterResult<()>;

    fn update_attributes(&self, model: &str, id: &Value, data: &Row) -> AdapterResult<()>;

    fn find(&self, model: &str, id: &Value) -> AdapterResult<Option<Row>>;

    /// Rows matching `filter.where_`, ordered, then skipped and limited.
    fn all(&self, model: &str, filter: &Filter) -> AdapterResult<Vec<Row>>;

    fn destroy(&self, model: &str, id: &Value) -> AdapterResult<()>;

    fn destroy_all(&self, model: &str) -> AdapterResult<()>;

    fn count(&self, model: &str, conditions: &Where) -> AdapterResult<usize>;

    fn exists(&self, _model: &str, _id: &Value) -> AdapterResult<bool> {
        Err(unsupported(self.name(), "exists"))
    }

    /// Native upsert returning the stored row.
    fn update_or_create(&self, _model: &str, _data: &Row) -> AdapterResult<Row> {
        Err(unsupported(self.name(), "updateOrCreate"))
    }

    /// Type of a foreign key column pointing at `_foreign`. `None` keeps
    /// the engine default (`Number`).
    fn define_foreign_key(
        &self,
        _model: &str,
        _key: &str,
        _foreign: &str,
    ) -> AdapterResult<Option<PropertyType>> {
        Ok(None)
    }

    /// Drop and recreate storage for every defined model.
    fn automigrate(&self) -> AdapterResult<()> {
        Err(unsupported(self.name(), "automigrate"))
    }

    /// Bring storage in line with the definitions without losing data.
    fn autoupdate(&self) -> AdapterResult<()> {
        Err(unsupported(self.name(), "autoupdate"))
    }

    /// Whether storage already matches the definitions.
    fn is_actual(&self) -> AdapterResult<bool> {
        Err(unsupported(self.name(), "isActual"))
    }
}
