//! In-process adapter keeping every model's rows in insertion order.
//!
//! Identities are auto-incrementing integers starting at 1; explicit
//! integer identities, numeric strings included, move the counter past
//! themselves. Useful for tests and as the reference implementation of the
//! adapter contract.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use indexmap::IndexMap;
use log::trace;

use crate::config::MemoryConfig;
use crate::databases::filter;
use crate::error::{AdapterError, AdapterResult};
use crate::query::{Filter, Where};
use crate::traits::adapter::{Adapter, Capabilities, Created, ModelDescriptor};
use crate::value::{Row, Value};

#[derive(Debug)]
struct Table {
    id_name: String,
    rows: IndexMap<String, Row>,
    next_id: i64,
}

impl Table {
    fn new(id_name: &str, capacity: usize) -> Self {
        Self {
            id_name: id_name.to_string(),
            rows: IndexMap::with_capacity(capacity),
            next_id: 1,
        }
    }

    fn claim(&mut self, explicit: &Value) -> Value {
        if explicit.is_null() {
            let id = Value::Int(self.next_id);
            self.next_id += 1;
            return id;
        }
        let numeric = explicit
            .as_i64()
            .or_else(|| explicit.as_str().and_then(|s| s.parse::<i64>().ok()));
        if let Some(n) = numeric {
            self.next_id = self.next_id.max(n + 1);
        }
        explicit.clone()
    }
}

/// In-memory storage adapter.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    tables: Mutex<HashMap<String, Table>>,
    config: MemoryConfig,
}

impl MemoryAdapter {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn lock(&self) -> AdapterResult<MutexGuard<'_, HashMap<String, Table>>> {
        self.tables
            .lock()
            .map_err(|e| AdapterError::Lock(format!("memory adapter tables: {e}")))
    }

    fn with_table<T>(&self, model: &str, f: impl FnOnce(&mut Table) -> T) -> AdapterResult<T> {
        let mut tables = self.lock()?;
        let table = tables
            .entry(model.to_string())
            .or_insert_with(|| Table::new("id", self.config.initial_capacity));
        Ok(f(table))
    }
}

impl Adapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            exists: true,
            update_or_create: true,
            migrations: true,
        }
    }

    fn define(&self, descriptor: &ModelDescriptor) -> AdapterResult<()> {
        let mut tables = self.lock()?;
        tables
            .entry(descriptor.model.clone())
            .and_modify(|table| table.id_name = descriptor.id_name.clone())
            .or_insert_with(|| Table::new(&descriptor.id_name, self.config.initial_capacity));
        Ok(())
    }

    fn create(&self, model: &str, data: &Row) -> AdapterResult<Created> {
        self.with_table(model, |table| {
            let explicit = data.get(&table.id_name).cloned().unwrap_or_default();
            let id = table.claim(&explicit);
            let mut row = data.clone();
            row.insert(table.id_name.clone(), id.clone());
            table.rows.insert(id.key_string(), row);
            trace!("memory: {model} <- #{id}");
            Created::new(id)
        })
    }

    fn save(&self, model: &str, data: &Row) -> AdapterResult<()> {
        self.with_table(model, |table| {
            let id = data.get(&table.id_name).cloned().unwrap_or_default();
            table.rows.insert(id.key_string(), data.clone());
        })
    }

    fn update_attributes(&self, model: &str, id: &Value, data: &Row) -> AdapterResult<()> {
        self.with_table(model, |table| {
            let row = table.rows.entry(id.key_string()).or_default();
            for (key, value) in data {
                row.insert(key.clone(), value.clone());
            }
        })
    }

    fn find(&self, model: &str, id: &Value) -> AdapterResult<Option<Row>> {
        self.with_table(model, |table| table.rows.get(&id.key_string()).cloned())
    }

    fn all(&self, model: &str, query: &Filter) -> AdapterResult<Vec<Row>> {
        let rows = self.with_table(model, |table| table.rows.values().cloned().collect::<Vec<_>>())?;
        Ok(filter::apply(rows, query))
    }

    fn destroy(&self, model: &str, id: &Value) -> AdapterResult<()> {
        self.with_table(model, |table| {
            table.rows.shift_remove(&id.key_string());
        })
    }

    fn destroy_all(&self, model: &str) -> AdapterResult<()> {
        self.with_table(model, |table| table.rows.clear())
    }

    fn count(&self, model: &str, conditions: &Where) -> AdapterResult<usize> {
        self.with_table(model, |table| {
            table.rows.values().filter(|row| conditions.matches(row)).count()
        })
    }

    fn exists(&self, model: &str, id: &Value) -> AdapterResult<bool> {
        self.with_table(model, |table| table.rows.contains_key(&id.key_string()))
    }

    fn update_or_create(&self, model: &str, data: &Row) -> AdapterResult<Row> {
        self.with_table(model, |table| {
            let explicit = data.get(&table.id_name).cloned().unwrap_or_default();
            if !explicit.is_null() {
                if let Some(row) = table.rows.get_mut(&explicit.key_string()) {
                    for (key, value) in data {
                        row.insert(key.clone(), value.clone());
                    }
                    return row.clone();
                }
            }
            let id = table.claim(&explicit);
            let mut row = data.clone();
            row.insert(table.id_name.clone(), id.clone());
            table.rows.insert(id.key_string(), row.clone());
            row
        })
    }

    fn automigrate(&self) -> AdapterResult<()> {
        for table in self.lock()?.values_mut() {
            table.rows.clear();
            table.next_id = 1;
        }
        Ok(())
    }

    fn autoupdate(&self) -> AdapterResult<()> {
        Ok(())
    }

    fn is_actual(&self) -> AdapterResult<bool> {
        Ok(true)
    }
}
