//! Filter evaluation for adapters that hold rows in process.

use crate::query::Filter;
use crate::value::Row;

/// Apply `where`, then `order`, then `skip`/`limit` to a set of rows.
pub fn apply(rows: impl IntoIterator<Item = Row>, filter: &Filter) -> Vec<Row> {
    let mut rows: Vec<Row> = rows
        .into_iter()
        .filter(|row| filter.where_.matches(row))
        .collect();
    if !filter.order.is_empty() {
        rows.sort_by(|a, b| {
            filter
                .order
                .iter()
                .map(|order| order.compare(a, b))
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    rows.into_iter()
        .skip(filter.skip.unwrap_or(0))
        .take(filter.limit.unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FilterValue;
    use crate::row;
    use crate::value::Value;

    fn people() -> Vec<Row> {
        vec![
            row! { "id" => 1, "name" => "Carol", "age" => 40 },
            row! { "id" => 2, "name" => "alice", "age" => 25 },
            row! { "id" => 3, "name" => "Bob", "age" => 25 },
        ]
    }

    #[test]
    fn where_then_order_then_page() {
        let filter = Filter::new()
            .condition("age", FilterValue::lt(41))
            .order_by("age DESC")
            .order_by("name")
            .skip(1)
            .limit(1);
        let rows = apply(people(), &filter);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::from("Bob"));
    }

    #[test]
    fn empty_filter_keeps_insertion_order() {
        let ids: Vec<_> = apply(people(), &Filter::new())
            .into_iter()
            .map(|r| r["id"].clone())
            .collect();
        assert_eq!(ids, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }
}
