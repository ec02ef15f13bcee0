//! Ordered container backing list-typed properties (`type: [T]`).

use derive_more::Deref;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::Value;

/// An index-addressable list whose object items carry an auto-incrementing
/// `id`. Serializes to a plain array of its items.
#[derive(Debug, Clone, PartialEq, Deref)]
pub struct List {
    #[deref]
    items: Vec<Value>,
    next_id: i64,
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl List {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
        }
    }

    pub fn from_items(items: Vec<Value>) -> Self {
        let mut list = Self::new();
        for item in items {
            list.push(item);
        }
        list
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }

    /// Append an item. Object items without an `id` receive the next free one.
    pub fn push(&mut self, item: Value) -> &Value {
        let item = match item {
            Value::Object(mut row) => {
                match row.get("id").and_then(Value::as_i64) {
                    Some(id) if id >= self.next_id => self.next_id = id + 1,
                    Some(_) => {}
                    None if row.get("id").is_some_and(|id| !id.is_null()) => {}
                    None => {
                        row.insert("id".to_string(), Value::Int(self.next_id));
                        self.next_id += 1;
                    }
                }
                Value::Object(row)
            }
            other => other,
        };
        self.items.push(item);
        let last = self.items.len() - 1;
        &self.items[last]
    }

    /// Look up an item by its `id` (objects) or by value (scalars).
    pub fn find(&self, id: &Value) -> Option<&Value> {
        self.items.iter().find(|item| item_id(item).loose_eq(id))
    }

    /// Remove the item with the given `id`, returning it.
    pub fn remove(&mut self, id: &Value) -> Option<Value> {
        let index = self.items.iter().position(|item| item_id(item).loose_eq(id))?;
        Some(self.items.remove(index))
    }

    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Value, &Value) -> std::cmp::Ordering,
    {
        self.items.sort_by(compare);
    }

    /// Project one field out of every object item.
    pub fn pluck(&self, field: &str) -> Vec<Value> {
        self.items
            .iter()
            .map(|item| match item {
                Value::Object(row) => row.get(field).cloned().unwrap_or_default(),
                _ => Value::Null,
            })
            .collect()
    }
}

fn item_id(item: &Value) -> &Value {
    match item {
        Value::Object(row) => row.get("id").unwrap_or(&Value::Null),
        scalar => scalar,
    }
}

impl Serialize for List {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for List {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Value>::deserialize(deserializer).map(List::from_items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn object_items_get_sequential_ids() {
        let mut list = List::new();
        list.push(Value::Object(row! { "name" => "a" }));
        list.push(Value::Object(row! { "id" => 10, "name" => "b" }));
        list.push(Value::Object(row! { "name" => "c" }));

        assert_eq!(list.pluck("id"), vec![Value::Int(1), Value::Int(10), Value::Int(11)]);
    }

    #[test]
    fn remove_by_id_and_iterate() {
        let mut list = List::from_items(vec![
            Value::Object(row! { "name" => "a" }),
            Value::Object(row! { "name" => "b" }),
        ]);
        let removed = list.remove(&Value::Int(1)).unwrap();
        assert_eq!(removed.as_object().unwrap()["name"], Value::from("a"));
        assert_eq!(list.iter().count(), 1);
        assert!(list.find(&Value::from("2")).is_some());
    }

    #[test]
    fn serializes_as_plain_array() {
        let list = List::from_items(vec![Value::from("x")]);
        assert_eq!(serde_json::to_string(&list).unwrap(), "[\"x\"]");
    }
}
