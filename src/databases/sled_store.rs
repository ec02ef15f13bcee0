//! Sled-backed adapter.
//!
//! Every model gets its own `sled::Tree` named after its table. Rows are
//! stored as JSON; keys are big-endian integers for numeric identities (so
//! iteration follows insertion order for generated ids) and UTF-8 bytes
//! for everything else.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use log::{debug, trace};

use crate::config::SledConfig;
use crate::databases::filter;
use crate::error::AdapterResult;
use crate::query::{Filter, Where};
use crate::traits::adapter::{Adapter, Capabilities, Created, ModelDescriptor};
use crate::value::{Row, Value};

/// Storage adapter over an embedded sled database.
pub struct SledAdapter {
    db: sled::Db,
    config: SledConfig,
    layouts: RwLock<HashMap<String, Layout>>,
}

#[derive(Debug, Clone)]
struct Layout {
    table: String,
    id_name: String,
}

fn key_for(id: &Value) -> Vec<u8> {
    let numeric = id
        .as_i64()
        .or_else(|| id.as_str().and_then(|s| s.parse::<i64>().ok()));
    match numeric {
        Some(n) if n >= 0 => (n as u64).to_be_bytes().to_vec(),
        _ => id.key_string().into_bytes(),
    }
}

impl SledAdapter {
    /// Open (or create) the database described by `config`.
    pub fn open(config: SledConfig) -> AdapterResult<Self> {
        let mut sled_config = sled::Config::new()
            .cache_capacity(config.cache_size_mb * 1024 * 1024)
            .temporary(config.temporary);
        if !config.temporary {
            sled_config = sled_config.path(&config.path);
        }
        let db = sled_config.open()?;
        debug!("sled: opened {}", config.path.display());
        Ok(Self {
            db,
            config,
            layouts: RwLock::new(HashMap::new()),
        })
    }

    /// Throwaway database removed on drop.
    pub fn temp() -> AdapterResult<Self> {
        Self::open(SledConfig::temp())
    }

    /// Get direct access to the underlying sled database
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn layout(&self, model: &str) -> Layout {
        self.layouts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model)
            .cloned()
            .unwrap_or_else(|| Layout {
                table: model.to_string(),
                id_name: "id".to_string(),
            })
    }

    fn tree(&self, model: &str) -> AdapterResult<(sled::Tree, String)> {
        let layout = self.layout(model);
        Ok((self.db.open_tree(&layout.table)?, layout.id_name))
    }

    fn written(&self, tree: &sled::Tree) -> AdapterResult<()> {
        if self.config.flush_on_write {
            tree.flush()?;
        }
        Ok(())
    }

    fn put(&self, tree: &sled::Tree, id: &Value, row: &Row) -> AdapterResult<()> {
        tree.insert(key_for(id), serde_json::to_vec(row)?)?;
        self.written(tree)
    }

    fn read(bytes: &[u8]) -> AdapterResult<Row> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn rows(tree: &sled::Tree) -> AdapterResult<Vec<Row>> {
        let mut rows = Vec::with_capacity(tree.len());
        for entry in tree.iter() {
            let (_, bytes) = entry?;
            rows.push(Self::read(&bytes)?);
        }
        Ok(rows)
    }

    /// Fresh identity for `tree`, skipping keys taken by explicit ids.
    fn next_id(&self, tree: &sled::Tree) -> AdapterResult<Value> {
        loop {
            let id = Value::from(self.db.generate_id()? + 1);
            if !tree.contains_key(key_for(&id))? {
                return Ok(id);
            }
            trace!("sled: generated #{id} already taken in {:?}", tree.name());
        }
    }
}

impl Adapter for SledAdapter {
    fn name(&self) -> &'static str {
        "sled"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            exists: true,
            update_or_create: true,
            migrations: true,
        }
    }

    fn disconnect(&self) -> AdapterResult<()> {
        let flushed = self.db.flush()?;
        debug!("sled: flushed {flushed} bytes on disconnect");
        Ok(())
    }

    fn define(&self, descriptor: &ModelDescriptor) -> AdapterResult<()> {
        self.db.open_tree(&descriptor.table)?;
        self.layouts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                descriptor.model.clone(),
                Layout {
                    table: descriptor.table.clone(),
                    id_name: descriptor.id_name.clone(),
                },
            );
        Ok(())
    }

    fn create(&self, model: &str, data: &Row) -> AdapterResult<Created> {
        let (tree, id_name) = self.tree(model)?;
        let id = match data.get(&id_name) {
            Some(id) if !id.is_null() => id.clone(),
            _ => self.next_id(&tree)?,
        };
        let mut row = data.clone();
        row.insert(id_name, id.clone());
        self.put(&tree, &id, &row)?;
        trace!("sled: {model} <- #{id}");
        Ok(Created::new(id))
    }

    fn save(&self, model: &str, data: &Row) -> AdapterResult<()> {
        let (tree, id_name) = self.tree(model)?;
        let id = data.get(&id_name).cloned().unwrap_or_default();
        self.put(&tree, &id, data)
    }

    fn update_attributes(&self, model: &str, id: &Value, data: &Row) -> AdapterResult<()> {
        let (tree, _) = self.tree(model)?;
        let mut row = match tree.get(key_for(id))? {
            Some(bytes) => Self::read(&bytes)?,
            None => Row::new(),
        };
        for (key, value) in data {
            row.insert(key.clone(), value.clone());
        }
        self.put(&tree, id, &row)
    }

    fn find(&self, model: &str, id: &Value) -> AdapterResult<Option<Row>> {
        let (tree, _) = self.tree(model)?;
        tree.get(key_for(id))?
            .map(|bytes| Self::read(&bytes))
            .transpose()
    }

    fn all(&self, model: &str, query: &Filter) -> AdapterResult<Vec<Row>> {
        let (tree, _) = self.tree(model)?;
        Ok(filter::apply(Self::rows(&tree)?, query))
    }

    fn destroy(&self, model: &str, id: &Value) -> AdapterResult<()> {
        let (tree, _) = self.tree(model)?;
        tree.remove(key_for(id))?;
        self.written(&tree)
    }

    fn destroy_all(&self, model: &str) -> AdapterResult<()> {
        let (tree, _) = self.tree(model)?;
        tree.clear()?;
        self.written(&tree)
    }

    fn count(&self, model: &str, conditions: &Where) -> AdapterResult<usize> {
        let (tree, _) = self.tree(model)?;
        Ok(Self::rows(&tree)?
            .iter()
            .filter(|row| conditions.matches(row))
            .count())
    }

    fn exists(&self, model: &str, id: &Value) -> AdapterResult<bool> {
        let (tree, _) = self.tree(model)?;
        Ok(tree.contains_key(key_for(id))?)
    }

    fn update_or_create(&self, model: &str, data: &Row) -> AdapterResult<Row> {
        let (tree, id_name) = self.tree(model)?;
        let id = match data.get(&id_name) {
            Some(id) if !id.is_null() => id.clone(),
            _ => self.next_id(&tree)?,
        };
        let mut row = match tree.get(key_for(&id))? {
            Some(bytes) => Self::read(&bytes)?,
            None => Row::new(),
        };
        for (key, value) in data {
            row.insert(key.clone(), value.clone());
        }
        row.insert(id_name, id.clone());
        self.put(&tree, &id, &row)?;
        Ok(row)
    }

    fn automigrate(&self) -> AdapterResult<()> {
        let tables: Vec<String> = self
            .layouts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|layout| layout.table.clone())
            .collect();
        for table in tables {
            self.db.open_tree(&table)?.clear()?;
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
