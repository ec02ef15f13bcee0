// Class-level finders, paging and connection gating

pub mod common;

use assert_matches::assert_matches;
use common::CountingAdapter;
use netabase_orm::config::SchemaConfig;
use netabase_orm::databases::MemoryAdapter;
use netabase_orm::prelude::*;
use serde_json::json;

fn numbers(schema: Schema, count: i64) -> OrmResult<Model> {
    let number = schema.define(
        "Number",
        Properties::new()
            .with("n", PropertyType::Number)
            .with("label", PropertyType::String),
    )?;
    for n in 0..count {
        number.create(row! { "n" => n, "label" => format!("#{n}") })?;
    }
    Ok(number)
}

#[test_log::test]
fn test_iterate_visits_every_row_in_pages() -> OrmResult<()> {
    let (adapter, calls) = CountingAdapter::new();
    let number = numbers(Schema::new(adapter), 25)?;
    calls.reset();

    let mut seen = Vec::new();
    let visited = number.iterate(
        &Filter::new().order_by("n"),
        IterateOptions::builder().batch_size(10).build(),
        |item, position| {
            assert_eq!(item.get("n"), Value::Int(position as i64));
            seen.push(position);
            Ok(())
        },
    )?;

    assert_eq!(visited, 25);
    assert_eq!(seen, (0..25).collect::<Vec<_>>());
    // 10 + 10 + 5, the short page ends the walk
    assert_eq!(calls.all(), 3);
    Ok(())
}

#[test_log::test]
fn test_iterate_honours_limit_and_skip() -> OrmResult<()> {
    let number = numbers(Schema::memory(), 30)?;
    let mut positions = Vec::new();
    let visited = number.iterate(
        &Filter::new().order_by("n").skip(3).limit(12),
        IterateOptions::builder().batch_size(5).build(),
        |item, position| {
            assert_eq!(item.get("n"), Value::Int(position as i64));
            positions.push(position);
            Ok(())
        },
    )?;
    assert_eq!(visited, 12);
    assert_eq!(positions.first(), Some(&3));
    assert_eq!(positions.last(), Some(&14));
    Ok(())
}

#[test_log::test]
fn test_iterate_stops_or_finishes_the_page_on_error() -> OrmResult<()> {
    let number = numbers(Schema::memory(), 6)?;
    let fail_at_one = |touched: &mut Vec<usize>, position: usize| {
        touched.push(position);
        if position == 1 {
            Err(OrmError::Aborted("stop".into()))
        } else {
            Ok(())
        }
    };

    let mut sequential = Vec::new();
    let result = number.iterate(
        &Filter::new().order_by("n"),
        IterateOptions::builder().batch_size(4).build(),
        |_, position| fail_at_one(&mut sequential, position),
    );
    assert_matches!(result, Err(OrmError::Aborted(_)));
    assert_eq!(sequential, vec![0, 1]);

    let mut concurrent = Vec::new();
    let result = number.iterate(
        &Filter::new().order_by("n"),
        IterateOptions::builder().batch_size(4).concurrent(true).build(),
        |_, position| fail_at_one(&mut concurrent, position),
    );
    assert_matches!(result, Err(OrmError::Aborted(_)));
    assert_eq!(concurrent, vec![0, 1, 2, 3]);
    Ok(())
}

#[test_log::test]
fn test_upsert_with_native_support() -> OrmResult<()> {
    let number = numbers(Schema::memory(), 0)?;
    let created = number.upsert(row! { "id" => 40, "n" => 1 })?;
    assert_eq!(created.id(), Value::Int(40));

    let updated = number.upsert(row! { "id" => 40, "n" => 2 })?;
    assert_eq!(updated.get("n"), Value::Int(2));
    assert_eq!(number.count(&Where::new())?, 1);

    let fresh = number.upsert(row! { "n" => 3 })?;
    assert!(!fresh.id().is_null());
    assert_eq!(number.count(&Where::new())?, 2);
    Ok(())
}

#[test_log::test]
fn test_upsert_falls_back_to_find_then_write() -> OrmResult<()> {
    let (adapter, calls) = CountingAdapter::new();
    let number = numbers(Schema::new(adapter), 0)?;

    number.upsert(row! { "id" => 7, "n" => 1, "label" => "seven" })?;
    calls.reset();
    let updated = number.update_or_create(row! { "id" => 7, "n" => 2 })?;

    assert_eq!(calls.find(), 1);
    assert_eq!(updated.get("n"), Value::Int(2));
    let stored = number.find(7)?.expect("stored");
    assert_eq!(stored.get("label"), Value::from("seven"));
    assert_eq!(number.count(&Where::new())?, 1);
    Ok(())
}

#[test_log::test]
fn test_native_upsert_keeps_omitted_fields() -> OrmResult<()> {
    let number = numbers(Schema::memory(), 0)?;

    number.upsert(row! { "id" => 7, "n" => 1, "label" => "seven" })?;
    let updated = number.upsert(row! { "id" => 7, "n" => 2 })?;

    assert_eq!(updated.get("n"), Value::Int(2));
    assert_eq!(updated.get("label"), Value::from("seven"));
    let stored = number.find(7)?.expect("stored");
    assert_eq!(stored.get("label"), Value::from("seven"));
    assert_eq!(stored.get("n"), Value::Int(2));
    Ok(())
}

#[test_log::test]
fn test_find_or_create_uses_the_filter_equalities() -> OrmResult<()> {
    let number = numbers(Schema::memory(), 0)?;
    let filter = Filter::new().where_eq("label", "answer");

    let first = number.find_or_create(&filter, None)?;
    assert_eq!(first.get("label"), Value::from("answer"));
    let second = number.find_or_create(&filter, Some(row! { "label" => "answer", "n" => 42 }))?;

    assert_eq!(first.id(), second.id());
    assert!(second.get("n").is_null());
    assert_eq!(number.count(&Where::new())?, 1);
    Ok(())
}

#[test_log::test]
fn test_count_exists_and_pluck() -> OrmResult<()> {
    let number = numbers(Schema::memory(), 10)?;
    assert_eq!(number.count(&Where::new().cond("n", FilterValue::gte(5)))?, 5);
    assert_eq!(number.count(&Where::new().cond("n", FilterValue::inq([1, 3, 99])))?, 2);

    let first = number.find_one(&Filter::new().order_by("n"))?.expect("first");
    assert!(number.exists(first.id())?);
    assert!(!number.exists(9999)?);
    assert_matches!(number.exists(Value::Null), Err(OrmError::Configuration(_)));

    let labels = number.pluck(&Filter::new().order_by("n DESC").limit(3), "label")?;
    assert_eq!(labels, vec![Value::from("#9"), Value::from("#8"), Value::from("#7")]);
    Ok(())
}

#[test_log::test]
fn test_attribute_projection_strips_other_columns() -> OrmResult<()> {
    let number = numbers(Schema::memory(), 3)?;
    let rows = number.all(
        &Filter::new()
            .order_by("n")
            .attributes(Attributes::List(vec!["label".into()])),
    )?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get("label"), Value::from("#0"));
    assert!(rows[0].get("n").is_null());
    Ok(())
}

#[test_log::test]
fn test_filters_parse_from_json() -> OrmResult<()> {
    let number = numbers(Schema::memory(), 10)?;
    let filter = Filter::from_json(&json!({
        "where": { "n": { "lt": 6 } },
        "order": "n DESC",
        "offset": 1,
        "limit": 2,
    }))?;
    let picked: Vec<Value> = number.all(&filter)?.iter().map(|i| i.get("n")).collect();
    assert_eq!(picked, vec![Value::Int(4), Value::Int(3)]);

    assert_matches!(Filter::from_json(&json!(["n"])), Err(OrmError::Configuration(_)));
    Ok(())
}

#[test_log::test]
fn test_destroy_by_id_reports_whether_it_found_the_record() -> OrmResult<()> {
    let number = numbers(Schema::memory(), 2)?;
    let first = number.find_one(&Filter::new().order_by("n"))?.expect("first");

    assert!(number.destroy_by_id(first.id())?);
    assert!(!number.destroy_by_id(first.id())?);
    assert_eq!(number.count(&Where::new())?, 1);
    Ok(())
}

#[test_log::test]
fn test_automigrate_empties_storage() -> OrmResult<()> {
    let schema = Schema::memory();
    let number = numbers(schema.clone(), 4)?;
    schema.automigrate()?;
    assert_eq!(number.count(&Where::new())?, 0);
    assert!(schema.is_actual()?);

    // generic adapters without migrations keep their data
    let counted = Schema::new(CountingAdapter::new().0);
    let kept = numbers(counted.clone(), 2)?;
    counted.automigrate()?;
    assert_eq!(kept.count(&Where::new())?, 2);
    Ok(())
}

#[test_log::test]
fn test_eager_schemas_require_connect() -> OrmResult<()> {
    let schema = Schema::with_config(
        MemoryAdapter::default(),
        SchemaConfig::builder().lazy_connect(false).build(),
    );
    let number = numbers(schema.clone(), 0)?;
    assert!(!schema.is_connected());
    assert_matches!(number.create(row! { "n" => 1 }), Err(OrmError::Configuration(_)));

    schema.connect()?;
    number.create(row! { "n" => 1 })?;
    assert_eq!(number.count(&Where::new())?, 1);
    Ok(())
}

#[test_log::test]
fn test_lazy_schemas_connect_on_first_use() -> OrmResult<()> {
    let schema = Schema::memory();
    let number = numbers(schema.clone(), 0)?;
    assert!(!schema.is_connected());
    number.create(row! { "n" => 1 })?;
    assert!(schema.is_connected());
    Ok(())
}
