//! Instance persistence: save, create, update, destroy, reload.
//!
//! Every write runs inside its hook events. Create fires
//! `create` around `save`, update fires `save` around `update`; validation
//! (itself the `validate` event) happens before either.

use log::debug;
use typed_builder::TypedBuilder;

use crate::error::{OrmError, OrmResult};
use crate::hooks::HookEvent;
use crate::model::{Instance, Model};
use crate::validation;
use crate::value::{Row, Value};

/// Per-call options for `save`, `create` and `update_attributes_with`.
#[derive(Debug, Clone, Copy, Default, TypedBuilder)]
#[builder(doc)]
pub struct SaveOptions {
    /// Override the schema's `validate_on_save`
    #[builder(default, setter(strip_option))]
    pub validate: Option<bool>,
}

impl SaveOptions {
    pub fn skip_validation() -> Self {
        Self { validate: Some(false) }
    }
}

/// Apply keys a before-hook changed in the payload onto the instance.
fn decorate(instance: &mut Instance, snapshot: &Row, payload: &Row) {
    for (key, value) in payload {
        if snapshot.get(key) != Some(value) {
            instance.set(key, value.clone());
        }
    }
}

impl Model {
    fn should_validate(&self, options: SaveOptions) -> bool {
        options
            .validate
            .unwrap_or_else(|| self.schema().config().validate_on_save)
    }

    /// Create path shared by `Model::create` and saving a new record.
    pub(crate) fn insert(&self, instance: &mut Instance, options: SaveOptions) -> OrmResult<()> {
        if self.should_validate(options) && !instance.is_valid()? {
            return Err(instance.validation_error().into());
        }
        let hooks = self.hooks();
        let mut data = instance.to_object(true, false);
        let snapshot = data.clone();

        hooks.run(HookEvent::Create, instance, &mut data, |instance, data| {
            hooks.run(HookEvent::Save, instance, data, |instance, data| {
                decorate(instance, &snapshot, data);
                let row = self.to_storage(instance.to_object(true, false));
                let created = self.adapter()?.create(self.name(), &row)?;
                instance.assign_identity(created.id);
                if created.rev.is_some() {
                    instance.rev = created.rev;
                }
                instance.sync();
                debug!("{}: created #{}", self.name(), instance.id());
                Ok(())
            })
        })
    }
}

impl Instance {
    /// Run the model's validations, storing failures in [`Instance::errors`].
    pub fn is_valid(&mut self) -> OrmResult<bool> {
        validation::run(self)
    }

    pub fn save(&mut self) -> OrmResult<()> {
        self.save_with(SaveOptions::default())
    }

    /// Create the record when it has no identity yet, otherwise write the
    /// full row back.
    pub fn save_with(&mut self, options: SaveOptions) -> OrmResult<()> {
        let model = self.model().clone();
        if self.is_new_record() {
            return model.insert(self, options);
        }
        if model.should_validate(options) && !self.is_valid()? {
            return Err(self.validation_error().into());
        }
        let hooks = model.hooks();
        let mut data = self.to_object(true, false);
        let snapshot = data.clone();

        hooks.run(HookEvent::Save, self, &mut data, |instance, data| {
            hooks.run(HookEvent::Update, instance, data, |instance, data| {
                decorate(instance, &snapshot, data);
                let row = model.to_storage(instance.to_object(true, false));
                model.adapter()?.save(model.name(), &row)?;
                instance.sync();
                Ok(())
            })
        })
    }

    pub fn update_attribute(&mut self, attr: &str, value: impl Into<Value>) -> OrmResult<()> {
        let mut data = Row::new();
        data.insert(attr.to_string(), value.into());
        self.update_attributes(data)
    }

    pub fn update_attributes(&mut self, data: Row) -> OrmResult<()> {
        self.update_attributes_with(data, SaveOptions::default())
    }

    /// Assign `data`, validate unless told otherwise and persist. Hooks
    /// receive `data` as the payload and may amend it.
    pub fn update_attributes_with(&mut self, data: Row, options: SaveOptions) -> OrmResult<()> {
        let model = self.model().clone();
        self.set_attributes(data.clone());
        if self.is_new_record() {
            return model.insert(self, options);
        }
        if model.should_validate(options) && !self.is_valid()? {
            return Err(self.validation_error().into());
        }
        let hooks = model.hooks();
        let mut payload = data;

        hooks.run(HookEvent::Save, self, &mut payload, |instance, payload| {
            hooks.run(HookEvent::Update, instance, payload, |instance, payload| {
                instance.set_attributes(payload.clone());
                let id = instance.id();
                let row = model.to_storage(instance.to_object(true, false));
                model.adapter()?.update_attributes(model.name(), &id, &row)?;
                instance.sync();
                Ok(())
            })
        })
    }

    /// Delete the record. Cached relations are dropped only once the
    /// adapter confirmed the delete.
    pub fn destroy(&mut self) -> OrmResult<()> {
        let model = self.model().clone();
        let hooks = model.hooks();
        let mut data = self.to_object(true, false);

        hooks.run(HookEvent::Destroy, self, &mut data, |instance, _| {
            let id = instance.id();
            if id.is_null() {
                return Err(OrmError::Configuration(format!(
                    "cannot destroy a {} without identity",
                    model.name()
                )));
            }
            model.adapter()?.destroy(model.name(), &id)?;
            instance.cached.clear();
            debug!("{}: destroyed #{id}", model.name());
            Ok(())
        })
    }

    /// Re-read the record from storage in place.
    pub fn reload(&mut self) -> OrmResult<()> {
        let id = self.id();
        if id.is_null() {
            return Err(OrmError::Configuration(format!(
                "cannot reload a {} without identity",
                self.model().name()
            )));
        }
        let fresh = self
            .model()
            .find(id.clone())?
            .ok_or_else(|| OrmError::NotFound(format!("{}#{id}", self.model().name())))?;
        self.data = fresh.data;
        self.data_was = fresh.data_was;
        self.cached = fresh.cached;
        self.errors = None;
        self.id_locked = true;
        Ok(())
    }
}
