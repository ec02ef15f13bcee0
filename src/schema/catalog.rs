use std::sync::{Arc, RwLock};

use indexmap::IndexMap;

use crate::model::ModelDefinition;

/// Registered model definitions in definition order.
#[derive(Debug, Default)]
pub struct Catalog {
    models: IndexMap<String, Arc<RwLock<ModelDefinition>>>,
}

impl Catalog {
    pub(crate) fn insert(&mut self, definition: ModelDefinition) -> Arc<RwLock<ModelDefinition>> {
        let name = definition.name().to_string();
        let entry = Arc::new(RwLock::new(definition));
        self.models.insert(name, entry.clone());
        entry
    }

    pub(crate) fn get(&self, name: &str) -> Option<Arc<RwLock<ModelDefinition>>> {
        self.models.get(name).cloned()
    }

    /// Case-insensitive lookup, used to find existing join models.
    pub(crate) fn get_ignore_case(&self, name: &str) -> Option<Arc<RwLock<ModelDefinition>>> {
        self.models
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, def)| def.clone())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &Arc<RwLock<ModelDefinition>>> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
