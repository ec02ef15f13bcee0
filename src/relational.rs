//! Relations between models.
//!
//! Three kinds are supported:
//!
//! - **belongsTo**: the owner holds a foreign key to one target record.
//!   Accessor `post.related("author")`.
//! - **hasMany**: target records hold a foreign key back to the owner.
//!   Accessor `user.scoped("posts")`, a [`Scope`](crate::scope::Scope).
//! - **hasMany through** (and hasAndBelongsToMany, which builds one): a join
//!   model holds foreign keys to both sides.
//!
//! Default names follow the model names: `Post belongsTo User` gives the
//! accessor `user` and key `userId`; `User hasMany Post` gives `posts`
//! with key `userId` on `Post`.

use log::debug;
use typed_builder::TypedBuilder;

use crate::error::{OrmError, OrmResult};
use crate::model::{Instance, Model, Properties, Related};
use crate::utils::inflect::{camelize, lower_first, pluralize};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    BelongsTo,
    HasMany,
    /// hasMany over a join model. `key_through` is the join model's key to
    /// the target; `collect` its belongsTo accessor for the target.
    HasManyThrough {
        through: String,
        key_through: String,
        collect: String,
    },
}

/// Relation descriptor.
///
/// `key_from` is read on the owner and matched against `key_to` on the
/// target: `(userId, id)` for belongsTo, `(id, userId)` for hasMany.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    pub model_from: String,
    pub model_to: String,
    pub key_from: String,
    pub key_to: String,
    pub multiple: bool,
}

impl Relation {
    pub fn is_through(&self) -> bool {
        matches!(self.kind, RelationKind::HasManyThrough { .. })
    }
}

/// Overrides for relation declarations.
#[derive(Debug, Clone, Default, TypedBuilder)]
#[builder(doc)]
pub struct RelationOptions {
    /// Accessor name
    #[builder(default, setter(strip_option, into))]
    pub alias: Option<String>,

    #[builder(default, setter(strip_option, into))]
    pub foreign_key: Option<String>,

    /// Join model for hasMany-through
    #[builder(default, setter(strip_option))]
    pub through: Option<Model>,
}

impl Model {
    pub fn relations(&self) -> indexmap::IndexMap<String, Relation> {
        self.definition().relations.clone()
    }

    pub fn relation(&self, name: &str) -> Option<Relation> {
        self.definition().relations.get(name).cloned()
    }

    fn add_relation(&self, relation: Relation) -> Relation {
        debug!(
            "{}: {:?} `{}` -> {} ({} -> {})",
            self.name(),
            relation.kind,
            relation.name,
            relation.model_to,
            relation.key_from,
            relation.key_to
        );
        self.definition_mut()
            .relations
            .insert(relation.name.clone(), relation.clone());
        relation
    }

    /// This model holds a foreign key to `target`.
    pub fn belongs_to(&self, target: &Model, options: RelationOptions) -> OrmResult<Relation> {
        let name = options
            .alias
            .unwrap_or_else(|| lower_first(target.name()));
        let foreign_key = options.foreign_key.unwrap_or_else(|| format!("{name}Id"));
        let relation = self.add_relation(Relation {
            name,
            kind: RelationKind::BelongsTo,
            model_from: self.name().to_string(),
            model_to: target.name().to_string(),
            key_from: foreign_key.clone(),
            key_to: target.id_name(),
            multiple: false,
        });
        self.schema()
            .define_foreign_key(self.name(), &foreign_key, target.name())?;
        Ok(relation)
    }

    /// `target` records hold a foreign key to this model, directly or via
    /// `options.through`.
    pub fn has_many(&self, target: &Model, options: RelationOptions) -> OrmResult<Relation> {
        let name = options
            .alias
            .unwrap_or_else(|| lower_first(&pluralize(target.name())));
        let foreign_key = options
            .foreign_key
            .unwrap_or_else(|| camelize(&format!("{}_id", self.name())));

        let kind = match &options.through {
            Some(through) => RelationKind::HasManyThrough {
                through: through.name().to_string(),
                key_through: camelize(&format!("{}_id", target.name())),
                collect: lower_first(target.name()),
            },
            None => {
                self.schema()
                    .define_foreign_key(target.name(), &foreign_key, self.name())?;
                RelationKind::HasMany
            }
        };
        Ok(self.add_relation(Relation {
            name,
            kind,
            model_from: self.name().to_string(),
            model_to: target.name().to_string(),
            key_from: self.id_name(),
            key_to: foreign_key,
            multiple: true,
        }))
    }

    /// Many-to-many through a join model named `ThisTarget` (or
    /// `TargetThis` if that one exists), created when missing.
    pub fn has_and_belongs_to_many(
        &self,
        target: &Model,
        options: RelationOptions,
    ) -> OrmResult<Relation> {
        let through = match options.through.clone() {
            Some(through) => through,
            None => {
                let schema = self.schema();
                let forward = format!("{}{}", self.name(), target.name());
                let backward = format!("{}{}", target.name(), self.name());
                match schema
                    .find_model_ignore_case(&forward)
                    .or_else(|| schema.find_model_ignore_case(&backward))
                {
                    Some(existing) => existing,
                    None => schema.define(&forward, Properties::new())?,
                }
            }
        };
        through.belongs_to(self, RelationOptions::default())?;
        through.belongs_to(target, RelationOptions::default())?;
        self.has_many(
            target,
            RelationOptions {
                through: Some(through),
                ..options
            },
        )
    }
}

/// Argument of the generic relation accessor.
#[derive(Debug, Clone)]
pub enum RelationArg {
    /// Cached value, fetching on first access
    Get,
    /// Always re-query
    Refresh,
    /// Point a belongsTo at this record
    Set(Instance),
    /// Point a belongsTo at a raw key
    SetKey(Value),
}

impl Instance {
    fn relation_named(&self, name: &str) -> OrmResult<Relation> {
        self.model().relation(name).ok_or_else(|| {
            OrmError::Configuration(format!(
                "Relation \"{name}\" is not defined for {} model",
                self.model().name()
            ))
        })
    }

    /// Single entry point for relation access.
    pub fn relation(&mut self, name: &str, arg: RelationArg) -> OrmResult<Related> {
        let relation = self.relation_named(name)?;
        match (&relation.kind, arg) {
            (RelationKind::BelongsTo, RelationArg::Get) => {
                Ok(Related::One(self.fetch_owner(&relation, false)?.map(Box::new)))
            }
            (RelationKind::BelongsTo, RelationArg::Refresh) => {
                Ok(Related::One(self.fetch_owner(&relation, true)?.map(Box::new)))
            }
            (RelationKind::BelongsTo, RelationArg::Set(target)) => {
                self.set_related(name, &target)?;
                Ok(Related::One(Some(Box::new(target))))
            }
            (RelationKind::BelongsTo, RelationArg::SetKey(key)) => {
                self.set_related_key(name, key)?;
                Ok(Related::One(None))
            }
            (_, RelationArg::Get) => Ok(Related::Many(self.scoped(name)?.get()?)),
            (_, RelationArg::Refresh) => Ok(Related::Many(self.scoped(name)?.fetch(true)?)),
            (_, RelationArg::Set(_) | RelationArg::SetKey(_)) => Err(OrmError::Configuration(
                format!("`{name}` is a to-many relation and cannot be assigned"),
            )),
        }
    }

    /// The record a belongsTo relation points at, cached after first use.
    pub fn related(&mut self, name: &str) -> OrmResult<Option<Instance>> {
        Ok(self.relation(name, RelationArg::Get)?.into_one())
    }

    /// Point a belongsTo relation at `target` and cache it.
    pub fn set_related(&mut self, name: &str, target: &Instance) -> OrmResult<()> {
        let relation = self.belongs_to_named(name)?;
        self.set(&relation.key_from, target.get(&relation.key_to));
        self.cache(name, Related::One(Some(Box::new(target.clone()))));
        Ok(())
    }

    /// Point a belongsTo relation at a raw key, dropping the cached record.
    pub fn set_related_key(&mut self, name: &str, key: impl Into<Value>) -> OrmResult<()> {
        let relation = self.belongs_to_named(name)?;
        self.set(&relation.key_from, key);
        self.uncache(name);
        Ok(())
    }

    fn belongs_to_named(&self, name: &str) -> OrmResult<Relation> {
        let relation = self.relation_named(name)?;
        if relation.kind != RelationKind::BelongsTo {
            return Err(OrmError::Configuration(format!(
                "`{name}` is not a belongsTo relation"
            )));
        }
        Ok(relation)
    }

    fn fetch_owner(&mut self, relation: &Relation, refresh: bool) -> OrmResult<Option<Instance>> {
        let key = self.get(&relation.key_from);
        if !refresh {
            if let Some(Related::One(cached)) = self.cached(&relation.name) {
                let current = match cached {
                    Some(target) => target.get(&relation.key_to).loose_eq(&key),
                    None => key.is_null(),
                };
                if current {
                    return Ok(cached.as_deref().cloned());
                }
            }
        }
        if key.is_null() {
            self.cache(&relation.name, Related::One(None));
            return Ok(None);
        }

        let target = self.model().schema().model(&relation.model_to)?;
        let found = target.find(key.clone())?;
        if let Some(record) = &found {
            let actual = record.get(&relation.key_to);
            if !actual.loose_eq(&key) {
                return Err(OrmError::PermissionDenied(format!(
                    "{}#{} does not belong to {}.{} = {key}",
                    relation.model_to,
                    actual,
                    self.model().name(),
                    relation.key_from
                )));
            }
        }
        self.cache(&relation.name, Related::One(found.clone().map(Box::new)));
        Ok(found)
    }
}
