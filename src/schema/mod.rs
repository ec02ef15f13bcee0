//! Schema: one adapter plus the catalog of models defined on it.
//!
//! The schema also gates every storage call on the connection state. With
//! `lazy_connect` (the default) the first operation connects; callers
//! racing a connection attempt in flight wait for it to finish.
//!
//! ```
//! use netabase_orm::prelude::*;
//!
//! # fn main() -> OrmResult<()> {
//! let schema = Schema::memory();
//! let post = schema.define("Post", Properties::new().with("title", PropertyType::String))?;
//!
//! assert!(!schema.is_connected());
//! post.create(row! { "title" => "hello" })?;
//! assert!(schema.is_connected());
//! # Ok(())
//! # }
//! ```

mod catalog;

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use log::{debug, info, warn};

pub use catalog::Catalog;

use crate::config::SchemaConfig;
use crate::databases::MemoryAdapter;
use crate::error::{OrmError, OrmResult};
use crate::model::property::{PropertyDef, PropertyType};
use crate::model::{Model, ModelDefinition, ModelSettings, Properties};
use crate::traits::adapter::{Adapter, ModelDescriptor};

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

type Listener = Box<dyn FnOnce(&Schema) + Send>;

struct Connection {
    state: ConnectionState,
    listeners: Vec<Listener>,
}

struct SchemaInner {
    adapter: Box<dyn Adapter>,
    catalog: RwLock<Catalog>,
    connection: Mutex<Connection>,
    connected: Condvar,
    config: SchemaConfig,
}

/// Shared handle; clones refer to the same schema.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("adapter", &self.inner.adapter.name())
            .field("state", &self.state())
            .field("models", &self.catalog().names().collect::<Vec<_>>())
            .finish()
    }
}

impl Schema {
    pub fn new(adapter: impl Adapter + 'static) -> Self {
        Self::with_config(adapter, SchemaConfig::default())
    }

    pub fn with_config(adapter: impl Adapter + 'static, config: SchemaConfig) -> Self {
        info!("schema created on the {} adapter", adapter.name());
        Self {
            inner: Arc::new(SchemaInner {
                adapter: Box::new(adapter),
                catalog: RwLock::new(Catalog::default()),
                connection: Mutex::new(Connection {
                    state: ConnectionState::Disconnected,
                    listeners: Vec::new(),
                }),
                connected: Condvar::new(),
                config,
            }),
        }
    }

    /// Schema over a fresh [`MemoryAdapter`].
    pub fn memory() -> Self {
        Self::new(MemoryAdapter::default())
    }

    pub fn adapter_name(&self) -> &'static str {
        self.inner.adapter.name()
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.inner.config
    }

    pub(crate) fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.inner.catalog.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Define (or redefine) a model.
    pub fn define(&self, name: &str, properties: Properties) -> OrmResult<Model> {
        self.define_with(name, properties, ModelSettings::default())
    }

    pub fn define_with(
        &self,
        name: &str,
        properties: Properties,
        settings: ModelSettings,
    ) -> OrmResult<Model> {
        let definition = ModelDefinition::new(name, properties, settings);
        self.inner.adapter.define(&definition.descriptor())?;
        let entry = self
            .inner
            .catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(definition);
        debug!("defined model {name}");
        Ok(Model::new(self.clone(), entry))
    }

    pub fn model(&self, name: &str) -> OrmResult<Model> {
        self.find_model(name)
            .ok_or_else(|| OrmError::Configuration(format!("model `{name}` is not defined")))
    }

    pub fn find_model(&self, name: &str) -> Option<Model> {
        let entry = self.catalog().get(name)?;
        Some(Model::new(self.clone(), entry))
    }

    pub(crate) fn find_model_ignore_case(&self, name: &str) -> Option<Model> {
        let entry = self.catalog().get_ignore_case(name)?;
        Some(Model::new(self.clone(), entry))
    }

    pub fn models(&self) -> Vec<Model> {
        let entries: Vec<_> = self.catalog().entries().cloned().collect();
        entries
            .into_iter()
            .map(|entry| Model::new(self.clone(), entry))
            .collect()
    }

    /// Add properties to an already defined model.
    pub fn extend_model(&self, name: &str, properties: Properties) -> OrmResult<Model> {
        let model = self.model(name)?;
        for (property, def) in properties.iter() {
            model.define_property(property, def.clone())?;
        }
        Ok(model)
    }

    /// Declare `key` on `model` as a foreign key to `foreign`. Existing
    /// properties are left alone; the type comes from the adapter, else
    /// `Number`.
    pub fn define_foreign_key(&self, model: &str, key: &str, foreign: &str) -> OrmResult<()> {
        let model = self.model(model)?;
        if model.property(key).is_some() {
            return Ok(());
        }
        let kind = self
            .inner
            .adapter
            .define_foreign_key(model.name(), key, foreign)?
            .unwrap_or(PropertyType::Number);
        debug!("{}: foreign key `{key}` -> {foreign} ({kind})", model.name());
        model.define_property(key, PropertyDef::new(kind))
    }

    pub fn state(&self) -> ConnectionState {
        self.lock_connection().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    fn lock_connection(&self) -> MutexGuard<'_, Connection> {
        self.inner
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect the adapter and fire the `on_connected` listeners. A no-op
    /// when already connected; waits when another attempt is in flight.
    pub fn connect(&self) -> OrmResult<()> {
        {
            let mut connection = self.lock_connection();
            loop {
                match connection.state {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Connecting => {
                        connection = self
                            .inner
                            .connected
                            .wait(connection)
                            .unwrap_or_else(PoisonError::into_inner);
                    }
                    ConnectionState::Disconnected => break,
                }
            }
            connection.state = ConnectionState::Connecting;
        }

        let result = self.inner.adapter.connect();
        let listeners = {
            let mut connection = self.lock_connection();
            connection.state = match result {
                Ok(()) => ConnectionState::Connected,
                Err(_) => ConnectionState::Disconnected,
            };
            self.inner.connected.notify_all();
            std::mem::take(&mut connection.listeners)
        };
        if let Err(e) = result {
            warn!("{} adapter failed to connect: {e}", self.adapter_name());
            return Err(e.into());
        }
        info!("connected to the {} adapter", self.adapter_name());
        for listener in listeners {
            listener(self);
        }
        Ok(())
    }

    pub fn disconnect(&self) -> OrmResult<()> {
        self.inner.adapter.disconnect()?;
        self.lock_connection().state = ConnectionState::Disconnected;
        info!("disconnected from the {} adapter", self.adapter_name());
        Ok(())
    }

    /// Run `listener` once connected: immediately if already connected.
    pub fn on_connected<F>(&self, listener: F)
    where
        F: FnOnce(&Schema) + Send + 'static,
    {
        let mut connection = self.lock_connection();
        if connection.state == ConnectionState::Connected {
            drop(connection);
            listener(self);
        } else {
            connection.listeners.push(Box::new(listener));
        }
    }

    /// The adapter, connecting first when needed.
    pub(crate) fn adapter(&self) -> OrmResult<&dyn Adapter> {
        if !self.is_connected() {
            if !self.inner.config.lazy_connect {
                return Err(OrmError::Configuration(format!(
                    "the {} adapter is not connected",
                    self.adapter_name()
                )));
            }
            self.connect()?;
        }
        Ok(self.inner.adapter.as_ref())
    }

    /// The adapter for definition-time calls, which need no connection.
    pub(crate) fn adapter_unchecked(&self) -> &dyn Adapter {
        self.inner.adapter.as_ref()
    }

    fn descriptors(&self) -> Vec<ModelDescriptor> {
        self.models()
            .iter()
            .map(|model| model.definition().descriptor())
            .collect()
    }

    /// Drop and recreate storage for every model. Adapters without
    /// migrations treat this as a no-op.
    pub fn automigrate(&self) -> OrmResult<()> {
        let adapter = self.adapter()?;
        if !adapter.capabilities().migrations {
            debug!("{} adapter has no migrations; automigrate skipped", adapter.name());
            return Ok(());
        }
        for descriptor in self.descriptors() {
            adapter.define(&descriptor)?;
        }
        Ok(adapter.automigrate()?)
    }

    pub fn autoupdate(&self) -> OrmResult<()> {
        let adapter = self.adapter()?;
        if !adapter.capabilities().migrations {
            debug!("{} adapter has no migrations; autoupdate skipped", adapter.name());
            return Ok(());
        }
        for descriptor in self.descriptors() {
            adapter.define(&descriptor)?;
        }
        Ok(adapter.autoupdate()?)
    }

    /// Whether storage matches the definitions; always true without
    /// migration support.
    pub fn is_actual(&self) -> OrmResult<bool> {
        let adapter = self.adapter()?;
        if !adapter.capabilities().migrations {
            return Ok(true);
        }
        Ok(adapter.is_actual()?)
    }
}
