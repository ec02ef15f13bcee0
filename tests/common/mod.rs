// Common test utilities and helpers
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use netabase_orm::databases::MemoryAdapter;
use netabase_orm::error::AdapterResult;
use netabase_orm::prelude::*;
use netabase_orm::traits::{Adapter, Capabilities, Created, ModelDescriptor};

/// Per-operation call counters shared between a test and its adapter.
#[derive(Debug, Clone, Default)]
pub struct Calls {
    pub all: Arc<AtomicUsize>,
    pub find: Arc<AtomicUsize>,
    pub count: Arc<AtomicUsize>,
}

impl Calls {
    pub fn all(&self) -> usize {
        self.all.load(Ordering::SeqCst)
    }

    pub fn find(&self) -> usize {
        self.find.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.all.store(0, Ordering::SeqCst);
        self.find.store(0, Ordering::SeqCst);
        self.count.store(0, Ordering::SeqCst);
    }
}

/// Memory adapter that counts reads and advertises no optional
/// capabilities, so the engine takes its generic paths.
pub struct CountingAdapter {
    inner: MemoryAdapter,
    calls: Calls,
}

impl CountingAdapter {
    pub fn new() -> (Self, Calls) {
        let calls = Calls::default();
        let adapter = Self {
            inner: MemoryAdapter::default(),
            calls: calls.clone(),
        };
        (adapter, calls)
    }
}

impl Adapter for CountingAdapter {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn define(&self, descriptor: &ModelDescriptor) -> AdapterResult<()> {
        self.inner.define(descriptor)
    }

    fn create(&self, model: &str, data: &Row) -> AdapterResult<Created> {
        self.inner.create(model, data)
    }

    fn save(&self, model: &str, data: &Row) -> AdapterResult<()> {
        self.inner.save(model, data)
    }

    fn update_attributes(&self, model: &str, id: &Value, data: &Row) -> AdapterResult<()> {
        self.inner.update_attributes(model, id, data)
    }

    fn find(&self, model: &str, id: &Value) -> AdapterResult<Option<Row>> {
        self.calls.find.fetch_add(1, Ordering::SeqCst);
        self.inner.find(model, id)
    }

    fn all(&self, model: &str, filter: &Filter) -> AdapterResult<Vec<Row>> {
        self.calls.all.fetch_add(1, Ordering::SeqCst);
        self.inner.all(model, filter)
    }

    fn destroy(&self, model: &str, id: &Value) -> AdapterResult<()> {
        self.inner.destroy(model, id)
    }

    fn destroy_all(&self, model: &str) -> AdapterResult<()> {
        self.inner.destroy_all(model)
    }

    fn count(&self, model: &str, conditions: &Where) -> AdapterResult<usize> {
        self.calls.count.fetch_add(1, Ordering::SeqCst);
        self.inner.count(model, conditions)
    }
}

/// Memory adapter whose `find` answers with a different identity than the
/// one asked for, as a corrupted or misbehaving backend would.
pub struct TamperingAdapter {
    inner: MemoryAdapter,
}

impl TamperingAdapter {
    pub fn new() -> Self {
        Self {
            inner: MemoryAdapter::default(),
        }
    }
}

impl Adapter for TamperingAdapter {
    fn name(&self) -> &'static str {
        "tampering"
    }

    fn define(&self, descriptor: &ModelDescriptor) -> AdapterResult<()> {
        self.inner.define(descriptor)
    }

    fn create(&self, model: &str, data: &Row) -> AdapterResult<Created> {
        self.inner.create(model, data)
    }

    fn save(&self, model: &str, data: &Row) -> AdapterResult<()> {
        self.inner.save(model, data)
    }

    fn update_attributes(&self, model: &str, id: &Value, data: &Row) -> AdapterResult<()> {
        self.inner.update_attributes(model, id, data)
    }

    fn find(&self, model: &str, id: &Value) -> AdapterResult<Option<Row>> {
        Ok(self.inner.find(model, id)?.map(|mut row| {
            let forged = row.get("id").and_then(Value::as_i64).unwrap_or(0) + 1000;
            row.insert("id".to_string(), Value::Int(forged));
            row
        }))
    }

    fn all(&self, model: &str, filter: &Filter) -> AdapterResult<Vec<Row>> {
        self.inner.all(model, filter)
    }

    fn destroy(&self, model: &str, id: &Value) -> AdapterResult<()> {
        self.inner.destroy(model, id)
    }

    fn destroy_all(&self, model: &str) -> AdapterResult<()> {
        self.inner.destroy_all(model)
    }

    fn count(&self, model: &str, conditions: &Where) -> AdapterResult<usize> {
        self.inner.count(model, conditions)
    }
}

/// User / Post / Tag fixture: `User hasMany Post`, `Post belongsTo User`
/// and `Post hasAndBelongsToMany Tag`.
pub struct Blog {
    pub schema: Schema,
    pub user: Model,
    pub post: Model,
    pub tag: Model,
}

pub fn blog(schema: Schema) -> OrmResult<Blog> {
    let user = schema.define(
        "User",
        Properties::new()
            .with("name", PropertyType::String)
            .with("email", PropertyType::String),
    )?;
    let post = schema.define(
        "Post",
        Properties::new()
            .with("title", PropertyType::String)
            .with("published", PropertyType::Boolean),
    )?;
    let tag = schema.define("Tag", Properties::new().with("label", PropertyType::String))?;

    user.has_many(&post, RelationOptions::default())?;
    post.belongs_to(&user, RelationOptions::default())?;
    post.has_and_belongs_to_many(&tag, RelationOptions::default())?;

    Ok(Blog {
        schema,
        user,
        post,
        tag,
    })
}
