mod config;
mod field;
mod generation;

pub use config::{Config, LoadReport, Schema, SchemaError, SetOutcome};
pub use field::{Constraints, FieldDefinition, FieldKind, FieldValue};
pub use generation::{generation_config, generation_schema, wire_parameters, SAMPLERS, WIRE_KEYS};
