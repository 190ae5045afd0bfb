mod registry;
mod tiers;

pub use registry::{ModelRegistry, ModelSpec, DEFAULT_MODEL};
pub use tiers::Tier;
