// Sled-backed schemas: persistence across reopen and relations on disk
#![cfg(feature = "sled")]

pub mod common;

use common::blog;
use netabase_orm::config::SledConfig;
use netabase_orm::databases::SledAdapter;
use netabase_orm::prelude::*;
use tempfile::TempDir;

fn open(dir: &TempDir) -> OrmResult<Schema> {
    let adapter = SledAdapter::open(SledConfig::new(dir.path().join("orm.sled")))?;
    Ok(Schema::new(adapter))
}

#[test_log::test]
fn test_records_survive_reopen() -> OrmResult<()> {
    let dir = TempDir::new().expect("temp dir");

    let (alice_id, post_id) = {
        let b = blog(open(&dir)?)?;
        let mut alice = b.user.create(row! { "name" => "alice", "email" => "a@example.com" })?;
        let post = alice.scoped("posts")?.create(row! { "title" => "persisted" })?;
        b.schema.disconnect()?;
        (alice.id(), post.id())
    };

    let b = blog(open(&dir)?)?;
    let alice = b.user.find(alice_id.clone())?.expect("alice after reopen");
    assert_eq!(alice.get("email"), Value::from("a@example.com"));
    assert!(!alice.is_new_record());

    let mut post = b.post.find(post_id)?.expect("post after reopen");
    assert_eq!(post.get("userId"), alice_id);
    let author = post.related("user")?.expect("author");
    assert_eq!(author.get("name"), Value::from("alice"));
    Ok(())
}

#[test_log::test]
fn test_updates_and_destroys_reach_disk() -> OrmResult<()> {
    let dir = TempDir::new().expect("temp dir");
    let b = blog(open(&dir)?)?;

    let mut bob = b.user.create(row! { "name" => "bob" })?;
    bob.update_attributes(row! { "name" => "robert" })?;
    let gone = b.user.create(row! { "name" => "gone" })?;
    b.user.destroy_by_id(gone.id())?;

    let names = b.user.pluck(&Filter::new().order_by("name"), "name")?;
    assert_eq!(names, vec![Value::from("robert")]);
    assert!(!b.user.exists(gone.id())?);
    Ok(())
}

#[test_log::test]
fn test_include_and_through_relations_on_sled() -> OrmResult<()> {
    let dir = TempDir::new().expect("temp dir");
    let b = blog(open(&dir)?)?;

    let mut carol = b.user.create(row! { "name" => "carol" })?;
    for title in ["one", "two"] {
        let mut post = carol.scoped("posts")?.create(row! { "title" => title })?;
        post.scoped("tags")?.create(row! { "label" => format!("tag-{title}") })?;
    }

    let users = b.user.all(&Filter::new().include(IncludeItem::new("posts").nested("tags")))?;
    let posts = users[0].cached("posts").expect("posts").many();
    assert_eq!(posts.len(), 2);
    for post in posts {
        let tags = post.cached("tags").expect("tags").many();
        assert_eq!(tags.len(), 1);
        assert_eq!(
            tags[0].get("label"),
            Value::from(format!("tag-{}", post.get("title").as_str().unwrap_or_default()))
        );
    }
    Ok(())
}

#[test_log::test]
fn test_upsert_and_automigrate_on_sled() -> OrmResult<()> {
    let dir = TempDir::new().expect("temp dir");
    let schema = open(&dir)?;
    let b = blog(schema.clone())?;

    b.tag.upsert(row! { "id" => 3, "label" => "three" })?;
    b.tag.upsert(row! { "id" => 3, "label" => "drei" })?;
    assert_eq!(b.tag.count(&Where::new())?, 1);
    assert_eq!(b.tag.find(3)?.expect("tag").get("label"), Value::from("drei"));

    schema.automigrate()?;
    assert_eq!(b.tag.count(&Where::new())?, 0);
    Ok(())
}

#[test_log::test]
fn test_generated_ids_never_replace_explicit_ones() -> OrmResult<()> {
    let dir = TempDir::new().expect("temp dir");
    let b = blog(open(&dir)?)?;

    let explicit = b.tag.create(row! { "id" => 1, "label" => "explicit" })?;
    let generated = b.tag.create(row! { "label" => "generated" })?;

    assert_ne!(explicit.id(), generated.id());
    assert_eq!(b.tag.count(&Where::new())?, 2);
    let kept = b.tag.find(1)?.expect("explicit tag");
    assert_eq!(kept.get("label"), Value::from("explicit"));
    Ok(())
}
