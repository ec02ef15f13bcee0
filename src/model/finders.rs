use log::{debug, trace};
use typed_builder::TypedBuilder;

use crate::error::{OrmError, OrmResult};
use crate::model::{Instance, Model, Related, SaveOptions};
use crate::query::{Filter, Where};
use crate::value::{Row, Value};

/// Outcome of [`Model::create_many`]. `errors` is `None` when every element
/// succeeded; otherwise it holds one slot per input.
#[derive(Debug)]
pub struct BatchCreate {
    pub errors: Option<Vec<Option<OrmError>>>,
    /// `None` only where the instance could not even be built.
    pub instances: Vec<Option<Instance>>,
}

/// Options for [`Model::iterate`].
#[derive(Debug, Clone, Copy, Default, TypedBuilder)]
#[builder(doc)]
pub struct IterateOptions {
    /// Rows per page; defaults to the schema's `batch_size`
    #[builder(default, setter(strip_option))]
    pub batch_size: Option<usize>,

    /// Hand every item of a page to the callback before checking for
    /// errors, instead of stopping at the first failure
    #[builder(default = false)]
    pub concurrent: bool,
}

impl Model {
    /// Unsaved instance.
    pub fn build(&self, data: Row) -> OrmResult<Instance> {
        Instance::build(self, data)
    }

    pub fn create(&self, data: Row) -> OrmResult<Instance> {
        self.create_with(data, SaveOptions::default())
    }

    pub fn create_with(&self, data: Row, options: SaveOptions) -> OrmResult<Instance> {
        let mut instance = self.build(data)?;
        self.insert(&mut instance, options)?;
        Ok(instance)
    }

    /// Create one record per row, collecting per-element failures.
    pub fn create_many(&self, rows: Vec<Row>) -> BatchCreate {
        let mut errors = Vec::with_capacity(rows.len());
        let mut instances = Vec::with_capacity(rows.len());
        for row in rows {
            match self.build(row) {
                Ok(mut instance) => {
                    errors.push(self.insert(&mut instance, SaveOptions::default()).err());
                    instances.push(Some(instance));
                }
                Err(e) => {
                    errors.push(Some(e));
                    instances.push(None);
                }
            }
        }
        let failed = errors.iter().any(Option::is_some);
        BatchCreate {
            errors: failed.then_some(errors),
            instances,
        }
    }

    fn require_id(&self, operation: &str, id: &Value) -> OrmResult<()> {
        if id.is_null() {
            return Err(OrmError::Configuration(format!(
                "{}.{operation} requires an identity argument",
                self.name()
            )));
        }
        Ok(())
    }

    pub fn find(&self, id: impl Into<Value>) -> OrmResult<Option<Instance>> {
        let id = id.into();
        self.require_id("find", &id)?;
        let Some(row) = self.adapter()?.find(self.name(), &id)? else {
            return Ok(None);
        };
        let mut row = self.from_storage(row);
        let id_name = self.id_name();
        if row.get(&id_name).is_none_or(Value::is_null) {
            row.insert(id_name, id);
        }
        Instance::hydrate(self, row).map(Some)
    }

    /// Query instances. `attributes` strips unlisted attributes before
    /// hydration; `include` eager-loads relations and, with `collect`,
    /// replaces every row by its cached related record.
    pub fn all(&self, filter: &Filter) -> OrmResult<Vec<Instance>> {
        let rows = self.adapter()?.all(self.name(), &self.storage_filter(filter))?;
        trace!("{}: all() fetched {} rows", self.name(), rows.len());
        let mut instances = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row = self.from_storage(row);
            if let Some(attributes) = &filter.attributes {
                row.retain(|key, _| attributes.allows(key));
            }
            instances.push(Instance::hydrate(self, row)?);
        }

        let Some(include) = filter.include.as_ref().filter(|spec| !spec.is_empty()) else {
            return Ok(instances);
        };
        crate::include::load(self, &mut instances, include)?;
        if let Some(collect) = &filter.collect {
            instances = instances
                .into_iter()
                .filter_map(|mut wrapper| match wrapper.cached.shift_remove(collect) {
                    Some(Related::One(Some(target))) => Some(*target),
                    _ => None,
                })
                .collect();
        }
        Ok(instances)
    }

    /// Values of one attribute for every matching row.
    pub fn pluck(&self, filter: &Filter, attr: &str) -> OrmResult<Vec<Value>> {
        let rows = self.adapter()?.all(self.name(), &self.storage_filter(filter))?;
        Ok(rows
            .into_iter()
            .map(|row| self.from_storage(row).shift_remove(attr).unwrap_or_default())
            .collect())
    }

    pub fn find_one(&self, filter: &Filter) -> OrmResult<Option<Instance>> {
        let filter = filter.clone().limit(1);
        Ok(self.all(&filter)?.into_iter().next())
    }

    /// First match of `filter`, or a new record from `data` (defaulting to
    /// the filter's equality conditions).
    pub fn find_or_create(&self, filter: &Filter, data: Option<Row>) -> OrmResult<Instance> {
        if let Some(found) = self.find_one(filter)? {
            return Ok(found);
        }
        self.create(data.unwrap_or_else(|| filter.where_.equalities()))
    }

    /// Insert or update by identity. Uses the adapter's native upsert when
    /// it has one, otherwise find + update or create.
    pub fn upsert(&self, data: Row) -> OrmResult<Instance> {
        let id = data.get(&self.id_name()).cloned().unwrap_or_default();
        if id.is_null() {
            return self.create(data);
        }
        let adapter = self.adapter()?;
        if adapter.capabilities().update_or_create {
            // only the given keys, coerced; stored values of the others stay
            let instance = self.build(data.clone())?;
            let partial: Row = data.keys().map(|key| (key.clone(), instance.raw(key))).collect();
            let row = adapter.update_or_create(self.name(), &self.to_storage(partial))?;
            return Instance::hydrate(self, self.from_storage(row));
        }
        match self.find(id)? {
            Some(mut found) => {
                found.update_attributes(data)?;
                Ok(found)
            }
            None => {
                let mut instance = self.build(data)?;
                self.insert(&mut instance, SaveOptions::default())?;
                Ok(instance)
            }
        }
    }

    pub fn update_or_create(&self, data: Row) -> OrmResult<Instance> {
        self.upsert(data)
    }

    /// Walk every match page by page, calling `f` with each instance and
    /// its absolute position. An overall `limit` is honoured and the last
    /// partial page is processed. Returns the number of items visited.
    pub fn iterate<F>(&self, filter: &Filter, options: IterateOptions, mut f: F) -> OrmResult<usize>
    where
        F: FnMut(Instance, usize) -> OrmResult<()>,
    {
        let batch_size = options
            .batch_size
            .unwrap_or_else(|| self.schema().config().batch_size)
            .max(1);
        let base = filter.skip.unwrap_or(0);
        let mut remaining = filter.limit;
        let mut visited = 0;

        loop {
            let take = match remaining {
                Some(0) => break,
                Some(left) => batch_size.min(left),
                None => batch_size,
            };
            let offset = base + visited;
            let page = self.all(&filter.clone().skip(offset).limit(take))?;
            let fetched = page.len();
            debug!("{}: iterate page at {offset} returned {fetched}", self.name());

            if options.concurrent {
                let mut first_error = None;
                for (i, item) in page.into_iter().enumerate() {
                    if let Err(e) = f(item, offset + i) {
                        first_error.get_or_insert(e);
                    }
                }
                if let Some(e) = first_error {
                    return Err(e);
                }
            } else {
                for (i, item) in page.into_iter().enumerate() {
                    f(item, offset + i)?;
                }
            }

            visited += fetched;
            if let Some(left) = remaining.as_mut() {
                *left -= fetched.min(*left);
            }
            if fetched < take {
                break;
            }
        }
        Ok(visited)
    }

    pub fn count(&self, conditions: &Where) -> OrmResult<usize> {
        let filter = self.storage_filter(&Filter::new().with_where(conditions.clone()));
        Ok(self.adapter()?.count(self.name(), &filter.where_)?)
    }

    pub fn exists(&self, id: impl Into<Value>) -> OrmResult<bool> {
        let id = id.into();
        self.require_id("exists", &id)?;
        let adapter = self.adapter()?;
        if adapter.capabilities().exists {
            return Ok(adapter.exists(self.name(), &id)?);
        }
        Ok(self.find(id)?.is_some())
    }

    /// Destroy one record by identity, running its destroy hooks. Returns
    /// whether a record was found.
    pub fn destroy_by_id(&self, id: impl Into<Value>) -> OrmResult<bool> {
        let id = id.into();
        self.require_id("destroyById", &id)?;
        match self.find(id)? {
            Some(mut instance) => {
                instance.destroy()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove every record of this model without running hooks.
    pub fn destroy_all(&self) -> OrmResult<()> {
        debug!("{}: destroy_all", self.name());
        Ok(self.adapter()?.destroy_all(self.name())?)
    }
}
