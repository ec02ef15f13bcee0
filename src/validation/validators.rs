use crate::error::OrmResult;
use crate::model::Instance;
use crate::query::Filter;
use crate::value::Value;

use super::{Message, Reporter, RuleConfig, Validation, ValidationRule};

pub(super) fn apply(
    instance: &Instance,
    rule: &ValidationRule,
    reporter: &mut Reporter,
) -> OrmResult<()> {
    let value = instance.get(&rule.attr);
    match &rule.validation {
        Validation::Presence => {
            if value.is_blank() {
                reporter.fail();
            }
        }
        Validation::Length(bounds) => {
            if null_check(&value, &rule.config, reporter) {
                return Ok(());
            }
            let Some(len) = value.length() else {
                return Ok(());
            };
            if bounds.min.is_some_and(|min| len < min) {
                reporter.fail_with("min");
            }
            if bounds.max.is_some_and(|max| len > max) {
                reporter.fail_with("max");
            }
            if bounds.is.is_some_and(|is| len != is) {
                reporter.fail_with("is");
            }
        }
        Validation::Numericality { integer } => {
            if null_check(&value, &rule.config, reporter) {
                return Ok(());
            }
            if !value.is_number() {
                reporter.fail_with("number");
            } else if *integer && value.as_i64().is_none() {
                reporter.fail_with("int");
            }
        }
        Validation::Inclusion(allowed) => {
            if null_check(&value, &rule.config, reporter) {
                return Ok(());
            }
            if !allowed.contains(&value) {
                reporter.fail();
            }
        }
        Validation::Exclusion(reserved) => {
            if null_check(&value, &rule.config, reporter) {
                return Ok(());
            }
            if reserved.contains(&value) {
                reporter.fail();
            }
        }
        Validation::Format(re) => {
            if null_check(&value, &rule.config, reporter) {
                return Ok(());
            }
            if value.as_str().is_some_and(|s| !re.is_match(s)) {
                reporter.fail();
            }
        }
        Validation::Custom(check) => check(instance, reporter)?,
        Validation::Uniqueness => uniqueness(instance, &rule.attr, value, reporter)?,
    }
    Ok(())
}

/// Reports `null`/`blank` unless allowed; true when the value is missing.
fn null_check(value: &Value, config: &RuleConfig, reporter: &mut Reporter) -> bool {
    if value.is_null() {
        if !config.allow_null {
            reporter.fail_with("null");
        }
        return true;
    }
    if value.is_blank() {
        if !config.allow_blank {
            reporter.fail_with("blank");
        }
        return true;
    }
    false
}

fn uniqueness(
    instance: &Instance,
    attr: &str,
    value: Value,
    reporter: &mut Reporter,
) -> OrmResult<()> {
    if value.is_null() {
        return Ok(());
    }
    let found = instance.model().all(&Filter::new().where_eq(attr, value))?;
    let own_id = instance.id();
    let duplicate = match found.as_slice() {
        [] => false,
        [only] => {
            let other_id = only.id();
            own_id.is_null() || other_id.is_null() || !other_id.loose_eq(&own_id)
        }
        _ => true,
    };
    if duplicate {
        reporter.fail();
    }
    Ok(())
}

pub(super) fn message_for(rule: &ValidationRule, kind: Option<&str>) -> String {
    match (&rule.config.message, kind) {
        (Some(Message::Text(text)), _) => text.clone(),
        (Some(Message::PerKind(messages)), Some(kind)) if messages.contains_key(kind) => {
            messages[kind].clone()
        }
        _ => default_message(rule.validation.as_ref(), kind).to_string(),
    }
}

fn default_message(validation: &str, kind: Option<&str>) -> &'static str {
    match (validation, kind) {
        ("presence", _) => "can't be blank",
        (_, Some("blank")) => "is blank",
        (_, Some("null")) => "is null",
        ("length", Some("min")) => "too short",
        ("length", Some("max")) => "too long",
        ("length", Some("is")) => "length is wrong",
        ("numericality", Some("int")) => "is not an integer",
        ("numericality", Some("number")) => "is not a number",
        ("inclusion", _) => "is not included in the list",
        ("exclusion", _) => "is reserved",
        ("uniqueness", _) => "is not unique",
        _ => "is invalid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_messages_by_kind() {
        assert_eq!(default_message("length", Some("min")), "too short");
        assert_eq!(default_message("length", Some("null")), "is null");
        assert_eq!(default_message("numericality", Some("number")), "is not a number");
        assert_eq!(default_message("custom", None), "is invalid");
        assert_eq!(default_message("presence", None), "can't be blank");
    }

    #[test]
    fn null_check_respects_allowances() {
        let mut reporter = Reporter::default();
        let lenient = RuleConfig::builder().allow_null(true).allow_blank(true).build();
        assert!(null_check(&Value::Null, &lenient, &mut reporter));
        assert!(null_check(&Value::from(""), &lenient, &mut reporter));
        assert!(reporter.failures.is_empty());

        assert!(null_check(&Value::Null, &RuleConfig::default(), &mut reporter));
        assert!(!null_check(&Value::from("x"), &RuleConfig::default(), &mut reporter));
        assert_eq!(reporter.failures.len(), 1);
    }
}
