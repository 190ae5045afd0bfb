use easel_contracts::events::{decode_event_stream, StreamEvent};
use easel_contracts::models::{ModelRegistry, Tier, DEFAULT_MODEL};
use easel_contracts::schema::{wire_parameters, Config};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::transport::{ApiResponse, ApiTransport, ClientError};

pub const PRICE_ENDPOINT: &str = "/ai/generate-image/request-price";
pub const GENERATE_ENDPOINT: &str = "/ai/generate-image";

const ERROR_BODY_MAX_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceQuote {
    #[serde(default)]
    request_eligible_for_unlimited_generation: bool,
    cost_per_prompt: Option<i64>,
    num_prompts: Option<i64>,
    free_prompts: Option<i64>,
}

impl PriceQuote {
    fn total(&self) -> Result<i64, ClientError> {
        if self.request_eligible_for_unlimited_generation {
            return Ok(0);
        }
        let (Some(cost), Some(count), Some(free)) =
            (self.cost_per_prompt, self.num_prompts, self.free_prompts)
        else {
            return Err(ClientError::InvalidPayload(
                "price quote is missing costPerPrompt, numPrompts or freePrompts".to_string(),
            ));
        };
        count
            .checked_sub(free)
            .and_then(|billable| cost.checked_mul(billable))
            .ok_or_else(|| {
                ClientError::InvalidPayload(format!(
                    "price quote overflows: {cost} per prompt for {count} prompts ({free} free)"
                ))
            })
    }
}

/// Owns the active generation parameters and talks to the provider.
pub struct GenerationClient<T: ApiTransport> {
    transport: T,
    token: String,
    models: ModelRegistry,
    prompt: String,
    model: String,
    tier: Tier,
    config: Config,
}

impl<T: ApiTransport> GenerationClient<T> {
    pub fn new(transport: T, token: impl Into<String>, config: Config) -> Self {
        Self {
            transport,
            token: token.into(),
            models: ModelRegistry::default(),
            prompt: String::new(),
            model: DEFAULT_MODEL.to_string(),
            tier: Tier::default(),
            config,
        }
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Unknown model names are ignored and the current model is kept.
    pub fn set_model(&mut self, model: &str) -> bool {
        if !self.models.contains(model) {
            tracing::debug!(model, "ignoring unknown model");
            return false;
        }
        self.model = model.to_string();
        true
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn set_tier(&mut self, tier: Tier) {
        self.tier = tier;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn to_request(&self) -> Map<String, Value> {
        wire_parameters(&self.config)
    }

    pub fn price_body(&self) -> Value {
        json!({
            "request": {
                "input": [self.prompt],
                "model": self.model,
                "parameters": self.to_request(),
            },
            "tier": self.tier.as_str(),
        })
    }

    pub fn generation_body(&self) -> Value {
        json!({
            "input": self.prompt,
            "model": self.model,
            "parameters": self.to_request(),
        })
    }

    pub fn price(&self) -> Result<i64, ClientError> {
        let response = self
            .transport
            .post_json(PRICE_ENDPOINT, &self.price_body(), None)?;
        if !response.is_success() || !response.is_json() {
            return Err(provider_error(&response));
        }
        let quote: PriceQuote = serde_json::from_str(&response.body)
            .map_err(|err| ClientError::InvalidPayload(format!("price quote: {err}")))?;
        let total = quote.total()?;
        tracing::debug!(model = %self.model, tier = %self.tier, total, "price quote");
        Ok(total)
    }

    /// An empty list means the provider answered without an event stream.
    pub fn generate(&self) -> Result<Vec<StreamEvent>, ClientError> {
        let response = self.transport.post_json(
            GENERATE_ENDPOINT,
            &self.generation_body(),
            Some(self.token.as_str()),
        )?;
        if !response.is_success() {
            return Err(provider_error(&response));
        }
        if !response.is_event_stream() {
            tracing::warn!(
                content_type = response.content_type.as_deref().unwrap_or(""),
                "generation response is not an event stream"
            );
            return Ok(Vec::new());
        }
        Ok(decode_event_stream(&response.body))
    }
}

fn provider_error(response: &ApiResponse) -> ClientError {
    let message = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|payload| {
            payload
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            let body = response.body.trim();
            if body.is_empty() {
                format!(
                    "unexpected response ({})",
                    response.content_type.as_deref().unwrap_or("no content type")
                )
            } else {
                truncate_text(body, ERROR_BODY_MAX_CHARS)
            }
        });
    ClientError::Provider {
        status: response.status,
        message,
    }
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
