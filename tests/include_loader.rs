// Batched include/populate: query counts and cache contents

pub mod common;

use assert_matches::assert_matches;
use common::{Blog, Calls, CountingAdapter, blog};
use netabase_orm::prelude::*;

fn counted_blog() -> OrmResult<(Blog, Calls)> {
    let (adapter, calls) = CountingAdapter::new();
    let b = blog(Schema::new(adapter))?;
    Ok((b, calls))
}

/// `users` users with two posts each; every post gets the same two tags.
fn seed(b: &Blog, users: usize) -> OrmResult<()> {
    let rust = b.tag.create(row! { "label" => "rust" })?;
    let orm = b.tag.create(row! { "label" => "orm" })?;
    for n in 0..users {
        let mut user = b.user.create(row! { "name" => format!("user{n}") })?;
        for p in 0..2 {
            let mut post = user.scoped("posts")?.create(row! {
                "title" => format!("post{n}.{p}"),
                "published" => p == 0,
            })?;
            post.scoped("tags")?.add(&rust)?;
            post.scoped("tags")?.add(&orm)?;
        }
    }
    Ok(())
}

#[test_log::test]
fn test_empty_inputs_issue_no_queries() -> OrmResult<()> {
    let (b, calls) = counted_blog()?;
    let mut none: Vec<Instance> = Vec::new();
    b.user.include(&mut none, "posts")?;
    b.user.include(&mut none, vec!["posts", "nope"])?;
    assert!(none.is_empty());
    assert_eq!(calls.all(), 0);

    seed(&b, 1)?;
    let mut users = b.user.all(&Filter::new())?;
    calls.reset();
    b.user.include(&mut users, IncludeSpec::new())?;
    assert_eq!(calls.all(), 0);
    assert!(users[0].cached("posts").is_none());
    Ok(())
}

#[test_log::test]
fn test_one_query_per_include_item() -> OrmResult<()> {
    for owners in [1, 100] {
        let (b, calls) = counted_blog()?;
        seed(&b, owners)?;

        let mut posts = b.post.all(&Filter::new())?;
        assert_eq!(posts.len(), owners * 2);
        calls.reset();
        b.post.include(&mut posts, vec!["user"])?;
        assert_eq!(calls.all(), 1, "{owners} owners");

        let mut users = b.user.all(&Filter::new())?;
        calls.reset();
        b.user.include(&mut users, "posts")?;
        assert_eq!(calls.all(), 1, "{owners} owners");

        for user in &users {
            assert_eq!(user.cached("posts").map(|r| r.many().len()), Some(2));
        }
        for post in &posts {
            let author = post.cached("user").and_then(Related::one).expect("author");
            assert_eq!(author.id(), post.get("userId"));
        }
        // VERIFY: no per-row lookups happened
        assert_eq!(calls.find(), 0);
    }
    Ok(())
}

#[test_log::test]
fn test_nested_specs_cost_one_query_per_level() -> OrmResult<()> {
    let (b, calls) = counted_blog()?;
    seed(&b, 10)?;
    let mut users = b.user.all(&Filter::new())?;
    calls.reset();

    let spec = IncludeSpec::from_json(&serde_json::json!({ "posts": "tags" }))?;
    b.user.include(&mut users, spec)?;

    // posts, PostTag links, tags
    assert_eq!(calls.all(), 3);
    let first_posts = users[0].cached("posts").expect("posts").many();
    let tags = first_posts[0].cached("tags").expect("tags").many();
    let labels: Vec<Value> = tags.iter().map(|t| t.get("label")).collect();
    assert_eq!(labels, vec![Value::from("rust"), Value::from("orm")]);
    Ok(())
}

#[test_log::test]
fn test_unmatched_owners_get_empty_slots() -> OrmResult<()> {
    let (b, _) = counted_blog()?;
    b.user.create(row! { "name" => "lonely" })?;
    b.post.create(row! { "title" => "orphan" })?;

    let mut users = b.user.all(&Filter::new())?;
    b.user.include(&mut users, "posts")?;
    assert_matches!(users[0].cached("posts"), Some(Related::Many(items)) if items.is_empty());

    let mut posts = b.post.all(&Filter::new())?;
    b.post.include(&mut posts, "user")?;
    assert_matches!(posts[0].cached("user"), Some(Related::One(None)));

    // VERIFY: absence is visible in the serialized form
    assert!(posts[0].to_json()["user"].is_null());
    assert_eq!(users[0].to_json()["posts"], serde_json::json!([]));
    Ok(())
}

#[test_log::test]
fn test_populate_filters_each_item() -> OrmResult<()> {
    let (b, calls) = counted_blog()?;
    seed(&b, 3)?;
    let mut users = b.user.all(&Filter::new())?;
    calls.reset();

    let spec = IncludeItem::new("posts").filtered(Where::new().eq("published", true));
    b.user.populate(&mut users, spec)?;
    assert_eq!(calls.all(), 1);
    for user in &users {
        let posts = user.cached("posts").expect("posts").many();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].get("published"), Value::Bool(true));
    }
    Ok(())
}

#[test_log::test]
fn test_include_from_a_query_filter() -> OrmResult<()> {
    let (b, calls) = counted_blog()?;
    seed(&b, 2)?;
    calls.reset();

    let users = b.user.all(&Filter::new().include("posts").order_by("name DESC"))?;
    assert_eq!(calls.all(), 2);
    assert_eq!(users[0].get("name"), Value::from("user1"));
    assert_eq!(users[0].cached("posts").map(|r| r.many().len()), Some(2));
    Ok(())
}

#[test_log::test]
fn test_unknown_relation_aborts() -> OrmResult<()> {
    let (b, calls) = counted_blog()?;
    seed(&b, 1)?;
    let mut users = b.user.all(&Filter::new())?;
    calls.reset();

    let err = b.user.include(&mut users, vec!["posts", "comments"]).unwrap_err();
    assert_matches!(err, OrmError::Configuration(message) if message.contains("comments"));
    assert_eq!(calls.all(), 0);
    Ok(())
}

#[test_log::test]
fn test_collect_replaces_rows_by_their_relation() -> OrmResult<()> {
    let (b, _) = counted_blog()?;
    seed(&b, 1)?;
    let join = b.schema.model("PostTag")?;

    let tags = join.all(&Filter::new().include("tag").collect("tag"))?;
    assert_eq!(tags.len(), 4);
    assert!(tags.iter().all(|t| t.model().name() == "Tag"));
    Ok(())
}
