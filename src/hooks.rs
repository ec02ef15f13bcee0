//! Lifecycle hooks.
//!
//! Each model owns a [`HookTable`] with at most one function per [`Hook`].
//! Operations run through [`HookTable::run`], which sequences
//! `before -> work -> after`: a failing before-hook aborts the operation,
//! and the after-hook only fires once the work succeeded.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use log::trace;

use crate::error::OrmResult;
use crate::model::Instance;
use crate::value::Row;

/// Hook slots of a model.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr, strum::EnumIter,
)]
#[strum(serialize_all = "camelCase")]
pub enum Hook {
    AfterInitialize,
    BeforeValidate,
    AfterValidate,
    BeforeSave,
    AfterSave,
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDestroy,
    AfterDestroy,
    /// Legacy name, consulted when `BeforeValidate` is unset.
    BeforeValidation,
    /// Legacy name, consulted when `AfterValidate` is unset.
    AfterValidation,
}

/// Lifecycle event an operation triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum HookEvent {
    Initialize,
    Validate,
    Save,
    Create,
    Update,
    Destroy,
}

impl HookEvent {
    fn before(self) -> &'static [Hook] {
        match self {
            HookEvent::Initialize => &[],
            HookEvent::Validate => &[Hook::BeforeValidate, Hook::BeforeValidation],
            HookEvent::Save => &[Hook::BeforeSave],
            HookEvent::Create => &[Hook::BeforeCreate],
            HookEvent::Update => &[Hook::BeforeUpdate],
            HookEvent::Destroy => &[Hook::BeforeDestroy],
        }
    }

    fn after(self) -> &'static [Hook] {
        match self {
            HookEvent::Initialize => &[Hook::AfterInitialize],
            HookEvent::Validate => &[Hook::AfterValidate, Hook::AfterValidation],
            HookEvent::Save => &[Hook::AfterSave],
            HookEvent::Create => &[Hook::AfterCreate],
            HookEvent::Update => &[Hook::AfterUpdate],
            HookEvent::Destroy => &[Hook::AfterDestroy],
        }
    }
}

/// What a hook function sees: the instance and, for persistence events,
/// the payload about to be written. Keys a before-hook changes in `data`
/// are applied to the instance before the write.
pub struct HookContext<'a> {
    pub event: HookEvent,
    pub instance: &'a mut Instance,
    pub data: Option<&'a mut Row>,
}

pub type HookFn = Arc<dyn Fn(&mut HookContext<'_>) -> OrmResult<()> + Send + Sync>;

#[derive(Clone, Default)]
pub struct HookTable {
    hooks: IndexMap<Hook, HookFn>,
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}

impl HookTable {
    pub fn set(&mut self, hook: Hook, f: HookFn) {
        self.hooks.insert(hook, f);
    }

    pub fn clear(&mut self, hook: Hook) {
        self.hooks.shift_remove(&hook);
    }

    pub fn get(&self, hook: Hook) -> Option<&HookFn> {
        self.hooks.get(&hook)
    }

    fn first_of(&self, slots: &[Hook]) -> Option<HookFn> {
        slots.iter().find_map(|slot| self.hooks.get(slot).cloned())
    }

    /// Run `work` between the before- and after-hooks of `event`.
    pub(crate) fn run<T, F>(
        &self,
        event: HookEvent,
        instance: &mut Instance,
        data: &mut Row,
        work: F,
    ) -> OrmResult<T>
    where
        F: FnOnce(&mut Instance, &mut Row) -> OrmResult<T>,
    {
        if let Some(before) = self.first_of(event.before()) {
            trace!("before {event} hook on {}", instance.model().name());
            before(&mut HookContext {
                event,
                instance: &mut *instance,
                data: Some(&mut *data),
            })?;
        }
        let out = work(instance, data)?;
        self.after(event, instance, Some(data))?;
        Ok(out)
    }

    /// Fire only the after-hook of `event`.
    pub(crate) fn after(
        &self,
        event: HookEvent,
        instance: &mut Instance,
        data: Option<&mut Row>,
    ) -> OrmResult<()> {
        if let Some(after) = self.first_of(event.after()) {
            trace!("after {event} hook on {}", instance.model().name());
            after(&mut HookContext {
                event,
                instance,
                data,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn hook_names_are_camel_case() {
        assert_eq!(Hook::BeforeSave.to_string(), "beforeSave");
        assert_eq!(Hook::AfterInitialize.as_ref(), "afterInitialize");
        assert_eq!(Hook::iter().count(), 13);
    }

    #[test]
    fn legacy_validation_slots_are_fallbacks() {
        fn noop(_: &mut HookContext<'_>) -> OrmResult<()> {
            Ok(())
        }
        let mut table = HookTable::default();
        table.set(Hook::BeforeValidation, Arc::new(noop));
        assert!(table.first_of(HookEvent::Validate.before()).is_some());
        assert!(table.first_of(HookEvent::Validate.after()).is_none());
    }
}
