use indexmap::IndexMap;
use serde::Serialize;

/// Per-attribute validation messages and their machine-readable codes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Errors {
    messages: IndexMap<String, Vec<String>>,
    codes: IndexMap<String, Vec<String>>,
}

impl Errors {
    pub fn add(&mut self, attr: &str, message: impl Into<String>, code: impl Into<String>) {
        self.messages
            .entry(attr.to_string())
            .or_default()
            .push(message.into());
        self.codes
            .entry(attr.to_string())
            .or_default()
            .push(code.into());
    }

    pub fn messages(&self) -> &IndexMap<String, Vec<String>> {
        &self.messages
    }

    pub fn codes(&self) -> &IndexMap<String, Vec<String>> {
        &self.codes
    }

    /// Messages recorded for one attribute.
    pub fn get(&self, attr: &str) -> &[String] {
        self.messages.get(attr).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, attr: &str) -> bool {
        self.messages.contains_key(attr)
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.codes.clear();
    }
}
