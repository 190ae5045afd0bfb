use std::sync::Arc;

use serde_json::{Map, Value};

use super::config::{Config, Schema, SchemaError};
use super::field::{Constraints, FieldKind};

pub const SAMPLERS: &[&str] = &["k_euler_ancestral", "k_euler", "k_lms", "plms", "ddim"];

/// Internal field name to request parameter key. Fields missing here are
/// never sent.
pub const WIRE_KEYS: &[(&str, &str)] = &[
    ("height", "height"),
    ("width", "width"),
    ("samples", "n_samples"),
    ("steps", "steps"),
    ("scale", "scale"),
    ("seed", "seed"),
    ("qualityToggle", "qualityToggle"),
    ("negative", "uc"),
    ("negative_preset", "ucPreset"),
    ("sampler", "sampler"),
];

pub fn generation_schema() -> Result<Schema, SchemaError> {
    let mut schema = Schema::new();
    schema.declare(
        FieldKind::Integer,
        "height",
        Constraints::new().range(512..=1024).with_default(512),
    )?;
    schema.declare(
        FieldKind::Integer,
        "width",
        Constraints::new().range(512..=1024).with_default(768),
    )?;
    schema.declare(
        FieldKind::Integer,
        "samples",
        Constraints::new().range(1..=4).with_default(1),
    )?;
    schema.declare(
        FieldKind::Integer,
        "steps",
        Constraints::new().range(1..=50).with_default(28),
    )?;
    schema.declare(
        FieldKind::Integer,
        "scale",
        Constraints::new().range(2..=100).with_default(14),
    )?;
    schema.declare(FieldKind::Integer, "seed", Constraints::new())?;
    schema.declare(
        FieldKind::Boolean,
        "qualityToggle",
        Constraints::new().with_default(true),
    )?;
    schema.declare(
        FieldKind::Float,
        "strength",
        Constraints::new().min(0.0).max(1.0),
    )?;
    schema.declare(
        FieldKind::Float,
        "noise",
        Constraints::new().min(0.0).max(1.0),
    )?;
    schema.declare(
        FieldKind::String,
        "negative",
        Constraints::new().with_default(""),
    )?;
    schema.declare(
        FieldKind::Enum,
        "negative_preset",
        Constraints::new().allowed([0, 1, 2]),
    )?;
    schema.declare(
        FieldKind::Enum,
        "sampler",
        Constraints::new().allowed(SAMPLERS.iter().copied()),
    )?;
    Ok(schema)
}

pub fn generation_config() -> Result<Config, SchemaError> {
    Ok(Config::new(Arc::new(generation_schema()?)))
}

/// Request `parameters` object for the current config, unset fields omitted.
pub fn wire_parameters(config: &Config) -> Map<String, Value> {
    WIRE_KEYS
        .iter()
        .filter_map(|(field, wire)| {
            config
                .get(field)
                .map(|value| ((*wire).to_string(), value.to_json()))
        })
        .collect()
}
