// Instance lifecycle: dirty tracking, persistence round trips and hooks

pub mod common;

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use netabase_orm::prelude::*;
use proptest::prelude::*;

fn people() -> OrmResult<Model> {
    Schema::memory().define(
        "Person",
        Properties::new()
            .with("name", PropertyType::String)
            .with("age", PropertyType::Number)
            .with("active", PropertyType::Boolean),
    )
}

#[test_log::test]
fn test_round_trip_create_then_find() -> OrmResult<()> {
    let person = people()?;
    let created = person.create(row! { "name" => "Ada", "age" => 36, "active" => "false" })?;

    let found = person.find(created.id())?.expect("record should exist after create");

    // VERIFY: schema attributes survive storage, after coercion
    assert_eq!(found.get("name"), Value::from("Ada"));
    assert_eq!(found.get("age"), Value::Int(36));
    assert_eq!(found.get("active"), Value::Bool(false));
    assert_eq!(found.id(), created.id());
    Ok(())
}

#[test_log::test]
fn test_fresh_instances_are_clean() -> OrmResult<()> {
    let person = people()?;
    let mut bob = person.create(row! { "name" => "Bob" })?;
    for attr in person.property_names() {
        assert!(!bob.property_changed(&attr), "{attr} should be clean");
    }

    bob.set("name", "Robert");
    assert!(bob.property_changed("name"));
    assert_eq!(bob.was("name"), Value::from("Bob"));
    assert_eq!(bob.changed_properties(), vec!["name".to_string()]);

    bob.save()?;
    assert!(!bob.property_changed("name"));
    Ok(())
}

#[test_log::test]
fn test_reload_discards_local_changes() -> OrmResult<()> {
    let person = people()?;
    let mut eve = person.create(row! { "name" => "Eve" })?;
    eve.set("name", "Mallory");
    eve.reload()?;
    assert_eq!(eve.get("name"), Value::from("Eve"));
    assert!(!eve.property_changed("name"));
    Ok(())
}

#[test_log::test]
fn test_reload_of_deleted_record_is_not_found() -> OrmResult<()> {
    let person = people()?;
    let mut ghost = person.create(row! { "name" => "Ghost" })?;
    person.destroy_by_id(ghost.id())?;
    assert_matches!(ghost.reload(), Err(OrmError::NotFound(_)));
    Ok(())
}

#[test_log::test]
fn test_identity_is_read_only_once_persisted() -> OrmResult<()> {
    let person = people()?;
    let mut carol = person.create(row! { "name" => "Carol" })?;
    let id = carol.id();
    carol.set("id", 4242);
    assert_eq!(carol.id(), id);
    Ok(())
}

#[test_log::test]
fn test_update_attributes_persists_only_on_success() -> OrmResult<()> {
    let person = people()?;
    person.validates_presence_of(&["name"]);
    let mut dan = person.create(row! { "name" => "Dan", "age" => 20 })?;

    dan.update_attributes(row! { "age" => 21 })?;
    let stored = person.find(dan.id())?.expect("stored");
    assert_eq!(stored.get("age"), Value::Int(21));

    let err = dan.update_attributes(row! { "name" => "" }).unwrap_err();
    assert!(err.validation().is_some_and(|e| e.has_code("name", "presence")));
    let stored = person.find(dan.id())?.expect("stored");
    assert_eq!(stored.get("name"), Value::from("Dan"));
    Ok(())
}

#[test_log::test]
fn test_to_json_lists_every_property() -> OrmResult<()> {
    let person = people()?;
    let mut frank = person.build(row! { "name" => "Frank", "nickname" => "F" })?;
    frank.save()?;

    let json = frank.to_json();
    assert_eq!(json["name"], "Frank");
    assert_eq!(json["nickname"], "F");
    assert!(json["age"].is_null());
    assert!(json.get("id").is_some());
    Ok(())
}

#[test_log::test]
fn test_hooks_nest_create_around_save() -> OrmResult<()> {
    let person = people()?;
    let seen = Arc::new(Mutex::new(Vec::new()));
    for hook in [
        Hook::BeforeValidate,
        Hook::AfterValidate,
        Hook::BeforeCreate,
        Hook::AfterCreate,
        Hook::BeforeSave,
        Hook::AfterSave,
    ] {
        let seen = seen.clone();
        person.hook(hook, move |_| {
            seen.lock().unwrap().push(hook.to_string());
            Ok(())
        });
    }

    person.create(row! { "name" => "Grace" })?;

    // VERIFY: validation first, then create wrapping save
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            "beforeValidate",
            "afterValidate",
            "beforeCreate",
            "beforeSave",
            "afterSave",
            "afterCreate"
        ]
    );
    Ok(())
}

#[test_log::test]
fn test_updates_nest_update_inside_save() -> OrmResult<()> {
    let person = people()?;
    let mut heidi = person.create(row! { "name" => "Heidi" })?;
    let seen = Arc::new(Mutex::new(Vec::new()));
    for hook in [
        Hook::BeforeSave,
        Hook::AfterSave,
        Hook::BeforeUpdate,
        Hook::AfterUpdate,
    ] {
        let seen = seen.clone();
        person.hook(hook, move |_| {
            seen.lock().unwrap().push(hook.to_string());
            Ok(())
        });
    }

    heidi.set("age", 50);
    heidi.save()?;
    assert_eq!(
        *seen.lock().unwrap(),
        vec!["beforeSave", "beforeUpdate", "afterUpdate", "afterSave"]
    );
    Ok(())
}

#[test_log::test]
fn test_before_hooks_can_amend_and_abort() -> OrmResult<()> {
    let person = people()?;
    person.hook(Hook::BeforeSave, |ctx| {
        if let Some(data) = ctx.data.as_deref_mut() {
            if data.get("name").is_some_and(|n| n.as_str() == Some("forbidden")) {
                return Err(OrmError::Aborted("name is forbidden".into()));
            }
            data.insert("active".to_string(), Value::Bool(true));
        }
        Ok(())
    });

    let ivan = person.create(row! { "name" => "Ivan" })?;
    assert_eq!(ivan.get("active"), Value::Bool(true));

    assert_matches!(
        person.create(row! { "name" => "forbidden" }),
        Err(OrmError::Aborted(_))
    );
    assert_eq!(person.count(&Where::new())?, 1);
    Ok(())
}

#[test_log::test]
fn test_failed_destroy_hook_keeps_the_instance_intact() -> OrmResult<()> {
    let person = people()?;
    let mut judy = person.create(row! { "name" => "Judy" })?;
    person.hook(Hook::BeforeDestroy, |_| Err(OrmError::Aborted("keep".into())));

    assert_matches!(judy.destroy(), Err(OrmError::Aborted(_)));
    assert!(person.exists(judy.id())?);
    assert!(!judy.is_new_record());
    Ok(())
}

#[test_log::test]
fn test_destroy_all_empties_the_model() -> OrmResult<()> {
    let person = people()?;
    for n in 0..5 {
        person.create(row! { "name" => format!("p{n}") })?;
    }
    person.destroy_all()?;
    assert_eq!(person.count(&Where::new())?, 0);
    Ok(())
}

proptest! {
    #[test]
    fn prop_only_assigned_attributes_are_dirty(
        name in "[a-z]{1,8}",
        replacement in "[a-z]{1,8}",
        age in 0i64..120,
    ) {
        let person = people().unwrap();
        let mut p = person.create(row! { "name" => name.clone(), "age" => age }).unwrap();
        for attr in person.property_names() {
            prop_assert!(!p.property_changed(&attr));
        }

        p.set("name", replacement.clone());
        prop_assert_eq!(p.property_changed("name"), name != replacement);
        prop_assert!(!p.property_changed("age"));

        p.save().unwrap();
        prop_assert!(!p.property_changed("name"));
    }
}
