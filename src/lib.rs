//! # Netabase ORM
//!
//! An adapter-agnostic object mapper: typed model definitions over
//! pluggable storage backends, with dirty tracking, lifecycle hooks,
//! declarative validation, relations, batched eager loading and named
//! scopes.
//!
//! ## Features
//!
//! - **Models**: properties with type coercion, defaults, custom accessors
//!   and storage column renames
//! - **Dirty tracking**: every instance compares its data with the last
//!   persisted snapshot
//! - **Hooks**: `before`/`after` pairs around initialize, validate, save,
//!   create, update and destroy
//! - **Validation**: presence, length, numericality, inclusion, exclusion,
//!   format, uniqueness and custom rules
//! - **Relations**: belongsTo, hasMany, hasMany-through and
//!   hasAndBelongsToMany, with integrity checks on every traversal
//! - **Include/Populate**: one query per relation, whatever the number of
//!   owners
//! - **Scopes**: named filters that chain and cache
//! - **Backends**: an in-memory adapter and a sled adapter (feature `sled`)
//!
//! ## Quick Start
//!
//! ```
//! use netabase_orm::prelude::*;
//!
//! # fn main() -> OrmResult<()> {
//! let schema = Schema::memory();
//! let user = schema.define("User", Properties::new().with("name", PropertyType::String))?;
//! let post = schema.define("Post", Properties::new().with("title", PropertyType::String))?;
//! user.has_many(&post, RelationOptions::default())?;
//! post.belongs_to(&user, RelationOptions::default())?;
//! user.validates_presence_of(&["name"]);
//!
//! let mut alice = user.create(row! { "name" => "alice" })?;
//! alice.scoped("posts")?.create(row! { "title" => "hello" })?;
//!
//! let mut posts = post.all(&Filter::new().include("user"))?;
//! let author = posts[0].related("user")?.expect("author");
//! assert_eq!(author.get("name"), Value::from("alice"));
//!
//! assert!(user.create(row! {}).is_err());
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod config;
pub mod databases;
pub mod error;
pub mod hooks;
pub mod include;
pub mod model;
pub mod prelude;
pub mod query;
pub mod relational;
pub mod schema;
pub mod scope;
pub mod traits;
pub mod utils;
pub mod validation;
pub mod value;
