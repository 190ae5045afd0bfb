use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use super::field::{Constraints, FieldDefinition, FieldKind, FieldValue};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("field '{0}' is already declared")]
    DuplicateField(String),
}

/// Static table of field definitions, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: IndexMap<String, FieldDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(
        &mut self,
        kind: FieldKind,
        name: &str,
        constraints: Constraints,
    ) -> Result<(), SchemaError> {
        if self.fields.contains_key(name) {
            return Err(SchemaError::DuplicateField(name.to_string()));
        }
        self.fields.insert(
            name.to_string(),
            FieldDefinition::new(kind, name, constraints),
        );
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn initial(&self, name: &str) -> Option<FieldValue> {
        self.fields.get(name).and_then(FieldDefinition::initial)
    }
}

/// Result of a single `set`. Rejection leaves the stored value untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Accepted,
    Rejected,
    UnknownField,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub ignored: Vec<String>,
}

/// Current values for every field of a schema.
#[derive(Debug, Clone)]
pub struct Config {
    schema: Arc<Schema>,
    values: IndexMap<String, Option<FieldValue>>,
}

impl Config {
    pub fn new(schema: Arc<Schema>) -> Self {
        let values = schema
            .fields
            .values()
            .map(|def| (def.name.clone(), def.initial()))
            .collect();
        Self { schema, values }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name).and_then(Option::as_ref)
    }

    pub fn set(&mut self, name: &str, raw: impl Into<Value>) -> SetOutcome {
        let Some(def) = self.schema.field(name) else {
            return SetOutcome::UnknownField;
        };
        let sanitized = def.sanitize(raw.into());
        if !def.validate(&sanitized) {
            tracing::debug!(field = name, value = %sanitized, "config value rejected");
            return SetOutcome::Rejected;
        }
        let typed = def.typed(&sanitized);
        self.values.insert(name.to_string(), typed);
        SetOutcome::Accepted
    }

    pub fn reset(&mut self, name: &str) -> SetOutcome {
        let Some(def) = self.schema.field(name) else {
            return SetOutcome::UnknownField;
        };
        self.values.insert(name.to_string(), def.initial());
        SetOutcome::Accepted
    }

    pub fn list(&self) -> Vec<&str> {
        self.schema.names().collect()
    }

    pub fn dump(&self) -> IndexMap<String, Value> {
        self.values
            .iter()
            .map(|(name, value)| {
                (
                    name.clone(),
                    value.as_ref().map(FieldValue::to_json).unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    pub fn load<'a, I>(&mut self, mapping: I) -> LoadReport
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        let mut report = LoadReport::default();
        for (name, value) in mapping {
            match self.set(name, value.clone()) {
                SetOutcome::Accepted => report.accepted.push(name.clone()),
                SetOutcome::Rejected => report.rejected.push(name.clone()),
                SetOutcome::UnknownField => report.ignored.push(name.clone()),
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Map, Value};

    use super::{Config, Schema, SchemaError, SetOutcome};
    use crate::schema::field::{Constraints, FieldKind, FieldValue};

    fn sample_schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .declare(
                FieldKind::Integer,
                "steps",
                Constraints::new().range(1..=50).with_default(28),
            )
            .unwrap();
        schema
            .declare(FieldKind::Integer, "seed", Constraints::new())
            .unwrap();
        schema
            .declare(
                FieldKind::Boolean,
                "qualityToggle",
                Constraints::new().with_default(true),
            )
            .unwrap();
        schema
            .declare(
                FieldKind::Float,
                "strength",
                Constraints::new().min(0.0).max(1.0),
            )
            .unwrap();
        schema
            .declare(
                FieldKind::Enum,
                "sampler",
                Constraints::new().allowed(["k_euler", "ddim"]),
            )
            .unwrap();
        schema
    }

    #[test]
    fn declare_twice_is_an_error() {
        let mut schema = sample_schema();
        let err = schema
            .declare(FieldKind::Integer, "steps", Constraints::new())
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateField("steps".to_string()));
    }

    #[test]
    fn list_keeps_declaration_order() {
        let config = Config::new(Arc::new(sample_schema()));
        assert_eq!(
            config.list(),
            vec!["steps", "seed", "qualityToggle", "strength", "sampler"]
        );
    }

    #[test]
    fn out_of_range_set_leaves_field_unchanged() {
        let mut config = Config::new(Arc::new(sample_schema()));
        assert_eq!(config.set("steps", "40"), SetOutcome::Accepted);
        for raw in [json!(0), json!(51), json!("-3"), json!("many")] {
            assert_eq!(config.set("steps", raw), SetOutcome::Rejected);
            assert_eq!(config.get("steps"), Some(&FieldValue::Int(40)));
        }
    }

    #[test]
    fn unknown_field_is_reported() {
        let mut config = Config::new(Arc::new(sample_schema()));
        assert_eq!(config.set("missing", 1), SetOutcome::UnknownField);
        assert_eq!(config.reset("missing"), SetOutcome::UnknownField);
    }

    #[test]
    fn reset_restores_a_valid_initial_value() {
        let mut config = Config::new(Arc::new(sample_schema()));
        config.set("steps", 12);
        config.set("seed", "99");
        config.set("qualityToggle", "no");
        for name in config.list().iter().map(|name| name.to_string()).collect::<Vec<_>>() {
            assert_eq!(config.reset(&name), SetOutcome::Accepted);
            let def = config.schema().field(&name).unwrap();
            let current = config
                .get(&name)
                .map(FieldValue::to_json)
                .unwrap_or(Value::Null);
            assert!(def.validate(&current), "{name} reset to invalid {current}");
        }
        assert_eq!(config.get("steps"), Some(&FieldValue::Int(28)));
        assert_eq!(config.get("seed"), None);
        assert_eq!(config.get("qualityToggle"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn load_of_dump_round_trips() {
        let schema = Arc::new(sample_schema());
        let mut original = Config::new(schema.clone());
        original.set("steps", 7);
        original.set("strength", "0.25");
        original.set("sampler", "ddim");
        let snapshot = original.dump();

        let mut restored = Config::new(schema);
        restored.set("seed", 1234);
        let report = restored.load(&snapshot);
        assert!(report.rejected.is_empty(), "{report:?}");
        assert_eq!(restored.dump(), snapshot);
        assert_eq!(restored.get("seed"), None);
    }

    #[test]
    fn load_ignores_unknown_keys() {
        let mut config = Config::new(Arc::new(sample_schema()));
        let mut mapping = Map::new();
        mapping.insert("steps".to_string(), json!(3));
        mapping.insert("colour".to_string(), json!("blue"));
        mapping.insert("strength".to_string(), json!(4));
        let report = config.load(&mapping);
        assert_eq!(report.accepted, vec!["steps".to_string()]);
        assert_eq!(report.ignored, vec!["colour".to_string()]);
        assert_eq!(report.rejected, vec!["strength".to_string()]);
        assert_eq!(config.get("strength"), Some(&FieldValue::Float(0.0)));
    }

    #[test]
    fn dump_renders_no_value_as_null() {
        let config = Config::new(Arc::new(sample_schema()));
        let dump = config.dump();
        assert_eq!(dump.get("seed"), Some(&Value::Null));
        assert_eq!(dump.get("steps"), Some(&json!(28)));
        assert_eq!(dump.get("strength"), Some(&json!(0.0)));
    }
}
