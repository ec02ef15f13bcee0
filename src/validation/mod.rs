//! Declarative validation rules.
//!
//! Rules accumulate per model in declaration order and are never removed.
//! [`Instance::is_valid`](crate::model::Instance::is_valid) runs them inside
//! the `validate` hook event: synchronous rules first, then the rules
//! registered as asynchronous (custom async checks and uniqueness, which
//! queries the adapter).
//!
//! ```
//! use netabase_orm::prelude::*;
//!
//! # fn main() -> OrmResult<()> {
//! let schema = Schema::memory();
//! let user = schema.define(
//!     "User",
//!     Properties::new()
//!         .with("name", PropertyType::String)
//!         .with("age", PropertyType::Number),
//! )?;
//! user.validates_presence_of(&["name"]);
//! user.validates_numericality_of("age", true);
//!
//! let mut bob = user.build(row! { "age" => 1.5 })?;
//! assert!(!bob.is_valid()?);
//! assert_eq!(bob.errors().unwrap().codes()["name"], vec!["presence".to_string()]);
//! assert_eq!(bob.errors().unwrap().codes()["age"], vec!["numericality.int".to_string()]);
//! # Ok(())
//! # }
//! ```

mod errors;
mod validators;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use log::debug;
use typed_builder::TypedBuilder;

pub use errors::Errors;

use crate::error::{OrmError, OrmResult};
use crate::hooks::HookEvent;
use crate::model::{Instance, Model};
use crate::value::Value;

/// Boolean test over an instance, usable as an `if`/`unless` condition or
/// registered by name with [`Model::define_predicate`].
pub type Predicate = Arc<dyn Fn(&Instance) -> bool + Send + Sync>;

/// Custom validator body. Call [`Reporter::fail`] to flag the attribute.
pub type CustomValidator = Arc<dyn Fn(&Instance, &mut Reporter) -> OrmResult<()> + Send + Sync>;

/// `if`/`unless` condition of a rule.
#[derive(Clone)]
pub enum Condition {
    /// A named predicate if one is defined, else the truthiness of the
    /// property with that name. Unset properties count as false.
    Property(String),
    Predicate(Predicate),
}

impl Condition {
    pub fn when<F>(test: F) -> Self
    where
        F: Fn(&Instance) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate(Arc::new(test))
    }

    fn holds(&self, instance: &Instance) -> bool {
        match self {
            Condition::Predicate(test) => test(instance),
            Condition::Property(name) => match instance.model().predicate(name) {
                Some(test) => test(instance),
                None => instance.get(name).truthy(),
            },
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Property(name) => f.debug_tuple("Property").field(name).finish(),
            Condition::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Condition {
    fn from(name: &str) -> Self {
        Condition::Property(name.to_string())
    }
}

impl From<String> for Condition {
    fn from(name: String) -> Self {
        Condition::Property(name)
    }
}

/// Message override: one text for every failure, or one per failure kind
/// (`min`, `max`, `null`, `blank`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Text(String),
    PerKind(IndexMap<String, String>),
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Message::Text(text.to_string())
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Message::Text(text)
    }
}

/// Options shared by every rule.
#[derive(Debug, Clone, Default, TypedBuilder)]
#[builder(doc)]
pub struct RuleConfig {
    #[builder(default, setter(strip_option, into))]
    pub message: Option<Message>,

    /// Validate only when this holds
    #[builder(default, setter(strip_option, into))]
    pub if_: Option<Condition>,

    /// Skip when this holds
    #[builder(default, setter(strip_option, into))]
    pub unless: Option<Condition>,

    #[builder(default = false)]
    pub allow_null: bool,

    #[builder(default = false)]
    pub allow_blank: bool,
}

/// Length bounds, in characters for strings and items for lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LengthRule {
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub is: Option<usize>,
}

impl LengthRule {
    pub fn min(min: usize) -> Self {
        Self { min: Some(min), ..Self::default() }
    }

    pub fn max(max: usize) -> Self {
        Self { max: Some(max), ..Self::default() }
    }

    pub fn between(min: usize, max: usize) -> Self {
        Self { min: Some(min), max: Some(max), is: None }
    }

    pub fn exactly(is: usize) -> Self {
        Self { is: Some(is), ..Self::default() }
    }
}

/// Built-in validators. The variant name (lowercased) is the base error code.
#[derive(Clone, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Validation {
    Presence,
    Length(LengthRule),
    Numericality { integer: bool },
    Inclusion(Vec<Value>),
    Exclusion(Vec<Value>),
    Format(regex::Regex),
    Custom(CustomValidator),
    Uniqueness,
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::Length(rule) => f.debug_tuple("Length").field(rule).finish(),
            Validation::Inclusion(values) => f.debug_tuple("Inclusion").field(values).finish(),
            Validation::Exclusion(values) => f.debug_tuple("Exclusion").field(values).finish(),
            Validation::Format(re) => f.debug_tuple("Format").field(&re.as_str()).finish(),
            other => f.write_str(other.as_ref()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub attr: String,
    pub validation: Validation,
    pub config: RuleConfig,
    pub is_async: bool,
}

#[derive(Debug)]
enum Failure {
    Kind(Option<String>),
    Silent,
}

/// Collects the failures a validator reports for its attribute.
#[derive(Debug, Default)]
pub struct Reporter {
    failures: Vec<Failure>,
}

impl Reporter {
    /// Fail with the rule's default message.
    pub fn fail(&mut self) {
        self.failures.push(Failure::Kind(None));
    }

    /// Fail with a kind-specific message and a `validation.kind` code.
    pub fn fail_with(&mut self, kind: &str) {
        self.failures.push(Failure::Kind(Some(kind.to_string())));
    }

    /// Mark the instance invalid without recording a message.
    pub fn fail_silently(&mut self) {
        self.failures.push(Failure::Silent);
    }
}

impl Model {
    fn push_rule(&self, attr: &str, validation: Validation, config: RuleConfig, is_async: bool) {
        debug!("{}: validates {} of `{attr}`", self.name(), validation.as_ref());
        self.definition_mut().validations.push(ValidationRule {
            attr: attr.to_string(),
            validation,
            config,
            is_async,
        });
    }

    /// Register any built-in validation with explicit options.
    pub fn validates_with(&self, attr: &str, validation: Validation, config: RuleConfig) {
        let is_async = matches!(validation, Validation::Uniqueness);
        self.push_rule(attr, validation, config, is_async);
    }

    pub fn validates_presence_of(&self, attrs: &[&str]) {
        for attr in attrs {
            self.validates_with(attr, Validation::Presence, RuleConfig::default());
        }
    }

    pub fn validates_length_of(&self, attr: &str, rule: LengthRule) {
        self.validates_with(attr, Validation::Length(rule), RuleConfig::default());
    }

    pub fn validates_numericality_of(&self, attr: &str, integer: bool) {
        self.validates_with(attr, Validation::Numericality { integer }, RuleConfig::default());
    }

    pub fn validates_inclusion_of<I, V>(&self, attr: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.validates_with(attr, Validation::Inclusion(values), RuleConfig::default());
    }

    pub fn validates_exclusion_of<I, V>(&self, attr: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.validates_with(attr, Validation::Exclusion(values), RuleConfig::default());
    }

    pub fn validates_format_of(&self, attr: &str, pattern: &str) -> OrmResult<()> {
        let re = regex::Regex::new(pattern)
            .map_err(|e| OrmError::Configuration(format!("invalid format for `{attr}`: {e}")))?;
        self.validates_with(attr, Validation::Format(re), RuleConfig::default());
        Ok(())
    }

    pub fn validates_uniqueness_of(&self, attr: &str) {
        self.validates_with(attr, Validation::Uniqueness, RuleConfig::default());
    }

    /// Custom synchronous validator.
    pub fn validate<F>(&self, attr: &str, check: F)
    where
        F: Fn(&Instance, &mut Reporter) -> OrmResult<()> + Send + Sync + 'static,
    {
        self.push_rule(attr, Validation::Custom(Arc::new(check)), RuleConfig::default(), false);
    }

    /// Custom validator run in the second, out-of-band phase.
    pub fn validate_async<F>(&self, attr: &str, check: F)
    where
        F: Fn(&Instance, &mut Reporter) -> OrmResult<()> + Send + Sync + 'static,
    {
        self.push_rule(attr, Validation::Custom(Arc::new(check)), RuleConfig::default(), true);
    }

    pub fn validations(&self) -> Vec<ValidationRule> {
        self.definition().validations.clone()
    }
}

/// Run every rule of the instance's model inside the `validate` event.
pub(crate) fn run(instance: &mut Instance) -> OrmResult<bool> {
    let model = instance.model().clone();
    let (rules, hooks) = {
        let def = model.definition();
        (def.validations.clone(), def.hooks.clone())
    };
    let mut data = instance.to_object(true, false);
    instance.errors = None;

    hooks.run(HookEvent::Validate, instance, &mut data, |instance, _| {
        let mut errors = Errors::default();
        let mut valid = true;

        let (deferred, immediate): (Vec<_>, Vec<_>) = rules.iter().partition(|r| r.is_async);
        for rule in immediate {
            valid &= !check(instance, rule, &mut errors)?;
        }
        for rule in deferred {
            valid &= !check(instance, rule, &mut errors)?;
        }

        instance.errors = if valid { None } else { Some(errors) };
        Ok(valid)
    })
}

/// Returns whether the rule failed.
fn check(instance: &Instance, rule: &ValidationRule, errors: &mut Errors) -> OrmResult<bool> {
    if skipped(instance, &rule.config) {
        return Ok(false);
    }
    let mut reporter = Reporter::default();
    validators::apply(instance, rule, &mut reporter)?;
    if reporter.failures.is_empty() {
        return Ok(false);
    }

    let base = rule.validation.as_ref();
    for failure in reporter.failures {
        let Failure::Kind(kind) = failure else {
            continue;
        };
        let code = match &kind {
            Some(kind) => format!("{base}.{kind}"),
            None => base.to_string(),
        };
        let message = validators::message_for(rule, kind.as_deref());
        errors.add(&rule.attr, message, code);
    }
    Ok(true)
}

fn skipped(instance: &Instance, config: &RuleConfig) -> bool {
    if config.if_.as_ref().is_some_and(|c| !c.holds(instance)) {
        return true;
    }
    config.unless.as_ref().is_some_and(|c| c.holds(instance))
}
