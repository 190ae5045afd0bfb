use indexmap::IndexMap;

pub const DEFAULT_MODEL: &str = "nai-diffusion";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub description: String,
}

/// Allow-list of generation model identifiers the provider accepts.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, description: &str| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                description: description.to_string(),
            },
        );
    };

    insert("stable-diffusion", "Stable Diffusion base checkpoint");
    insert("nai-diffusion", "NAI Diffusion Anime (full)");
    insert("safe-diffusion", "NAI Diffusion Anime (curated)");
    insert("nai-diffusion-furry", "NAI Diffusion Furry");

    map
}
