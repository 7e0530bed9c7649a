//! Threshold rules: turn inbound payloads into alerts.
//!
//! Rules come from `[[rules]]` in the config file. Evaluation is pure;
//! [`RuleSet`] adds edge triggering so a value that stays out of bounds
//! raises one alert, not one per update.

use std::collections::HashSet;

use serde_json::Value;

use opsfeed_core::{AlertOptions, AlertQueue, Severity};

use crate::config::Rule;

/// One rule violation, ready to become an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub source: String,
}

impl Trigger {
    /// Raise this trigger on `queue`.
    pub fn raise(&self, queue: &AlertQueue) -> opsfeed_core::AlertId {
        queue.add_alert(
            self.message.clone(),
            self.severity,
            AlertOptions::new().title(&self.rule).source(&self.source),
        )
    }
}

/// Evaluate a single rule. `None` when the pointer doesn't resolve or
/// the value is within bounds.
pub fn evaluate(rule: &Rule, payload: &Value) -> Option<Trigger> {
    let value = payload.pointer(&rule.pointer)?;
    let reason = violation(rule, value)?;

    let message = rule.message.as_ref().map_or_else(
        || format!("{}: {reason}", rule.name),
        |template| {
            template
                .replace("{value}", &display_value(value))
                .replace("{name}", &rule.name)
        },
    );

    Some(Trigger {
        rule: rule.name.clone(),
        severity: rule.severity,
        message,
        source: rule.source.clone().unwrap_or_else(|| rule.name.clone()),
    })
}

fn violation(rule: &Rule, value: &Value) -> Option<String> {
    if let Some(expected) = &rule.equals {
        if value == expected {
            return Some(format!("value is {}", display_value(value)));
        }
    }

    let number = value.as_f64()?;
    if let Some(limit) = rule.above {
        if number > limit {
            return Some(format!("{number} is above {limit}"));
        }
    }
    if let Some(limit) = rule.below {
        if number < limit {
            return Some(format!("{number} is below {limit}"));
        }
    }
    None
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── RuleSet ──────────────────────────────────────────────────────────

/// Rules plus which of them are currently firing.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    firing: HashSet<String>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            firing: HashSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Triggers for rules that just started firing on this payload.
    ///
    /// A rule whose pointer is absent from the payload keeps its state,
    /// since updates from other topics don't carry its value.
    pub fn check(&mut self, payload: &Value) -> Vec<Trigger> {
        let mut fresh = Vec::new();
        for rule in &self.rules {
            if payload.pointer(&rule.pointer).is_none() {
                continue;
            }
            match evaluate(rule, payload) {
                Some(trigger) => {
                    if self.firing.insert(rule.name.clone()) {
                        fresh.push(trigger);
                    }
                }
                None => {
                    self.firing.remove(&rule.name);
                }
            }
        }
        fresh
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn hot() -> Rule {
        Rule {
            name: "temperature-high".into(),
            pointer: "/process/temperature".into(),
            above: Some(90.0),
            below: None,
            equals: None,
            severity: Severity::Critical,
            message: None,
            source: Some("process".into()),
        }
    }

    #[test]
    fn above_threshold_triggers() {
        let payload = json!({"process": {"temperature": 95.5}});
        let trigger = evaluate(&hot(), &payload).unwrap();

        assert_eq!(trigger.severity, Severity::Critical);
        assert_eq!(trigger.source, "process");
        assert_eq!(trigger.message, "temperature-high: 95.5 is above 90");
    }

    #[test]
    fn within_bounds_or_missing_is_quiet() {
        assert!(evaluate(&hot(), &json!({"process": {"temperature": 70}})).is_none());
        assert!(evaluate(&hot(), &json!({"sales": 1})).is_none());
        assert!(evaluate(&hot(), &json!({"process": {"temperature": "n/a"}})).is_none());
    }

    #[test]
    fn equals_and_template() {
        let rule = Rule {
            name: "line-state".into(),
            pointer: "/line/state".into(),
            above: None,
            below: None,
            equals: Some(json!("stopped")),
            severity: Severity::Error,
            message: Some("{name}: line is {value}".into()),
            source: None,
        };

        let trigger = evaluate(&rule, &json!({"line": {"state": "stopped"}})).unwrap();
        assert_eq!(trigger.message, "line-state: line is stopped");
        assert_eq!(trigger.source, "line-state");
    }

    #[test]
    fn rule_set_is_edge_triggered() {
        let mut rules = RuleSet::new(vec![hot()]);

        assert_eq!(rules.check(&json!({"process": {"temperature": 95}})).len(), 1);
        assert!(rules.check(&json!({"process": {"temperature": 97}})).is_empty());
        assert!(rules.check(&json!({"sales": {"total": 3}})).is_empty());

        assert!(rules.check(&json!({"process": {"temperature": 80}})).is_empty());
        assert_eq!(rules.check(&json!({"process": {"temperature": 99}})).len(), 1);
    }

    #[test]
    fn trigger_raises_alert() {
        let queue = AlertQueue::default();
        let trigger = evaluate(&hot(), &json!({"process": {"temperature": 91}})).unwrap();
        let id = trigger.raise(&queue);

        let alert = queue.get(&id).unwrap();
        assert_eq!(alert.title, "temperature-high");
        assert!(alert.persistent);
    }
}
