//! Generation request structures

use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP_K: i64 = 0;
/// Integer on the wire, kept as the service documents it.
pub const DEFAULT_TOP_P: i64 = 1;
pub const DEFAULT_TEMPERATURE: f64 = 0.75;
pub const DEFAULT_LENGTH_PENALTY: i64 = 1;
pub const DEFAULT_MAX_NEW_TOKENS: i64 = 500;
pub const DEFAULT_PRESENCE_PENALTY: i64 = 0;
/// Llama-2 chat instruction template
pub const DEFAULT_PROMPT_TEMPLATE: &str =
    "<s>[INST] <<SYS>>\n{system_prompt}\n<</SYS>>\n\n{prompt} [/INST]";

/// Request body posted to the predictions endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Always true: this connector only consumes streamed output
    pub stream: bool,
    pub input: GenerationInput,
}

/// Sampling and shape parameters for one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInput {
    pub top_k: i64,
    pub top_p: i64,
    pub prompt: String,
    pub temperature: f64,
    pub system_prompt: String,
    pub length_penalty: i64,
    pub max_new_tokens: i64,
    pub prompt_template: String,
    pub presence_penalty: i64,
}

/// Optional values for every tunable field of [`GenerationInput`].
///
/// `None` means "use the documented default". Values are passed through
/// without range checks; the remote service is the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length_penalty: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<i64>,
}

impl GenerationOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top_k(mut self, top_k: i64) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_top_p(mut self, top_p: i64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_length_penalty(mut self, length_penalty: i64) -> Self {
        self.length_penalty = Some(length_penalty);
        self
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: i64) -> Self {
        self.max_new_tokens = Some(max_new_tokens);
        self
    }

    pub fn with_prompt_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    pub fn with_presence_penalty(mut self, presence_penalty: i64) -> Self {
        self.presence_penalty = Some(presence_penalty);
        self
    }

    /// Fill every unset field from `fallback`, keeping the fields set here
    pub fn or(self, fallback: GenerationOverrides) -> Self {
        Self {
            top_k: self.top_k.or(fallback.top_k),
            top_p: self.top_p.or(fallback.top_p),
            temperature: self.temperature.or(fallback.temperature),
            length_penalty: self.length_penalty.or(fallback.length_penalty),
            max_new_tokens: self.max_new_tokens.or(fallback.max_new_tokens),
            prompt_template: self.prompt_template.or(fallback.prompt_template),
            presence_penalty: self.presence_penalty.or(fallback.presence_penalty),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl GenerationRequest {
    /// Build a streaming request with every parameter at its default
    pub fn new_default(prompt: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self::new_custom(prompt, system_prompt, GenerationOverrides::default())
    }

    /// Build a streaming request, substituting defaults for unset overrides
    pub fn new_custom(
        prompt: impl Into<String>,
        system_prompt: impl Into<String>,
        overrides: GenerationOverrides,
    ) -> Self {
        Self {
            stream: true,
            input: GenerationInput {
                top_k: overrides.top_k.unwrap_or(DEFAULT_TOP_K),
                top_p: overrides.top_p.unwrap_or(DEFAULT_TOP_P),
                prompt: prompt.into(),
                temperature: overrides.temperature.unwrap_or(DEFAULT_TEMPERATURE),
                system_prompt: system_prompt.into(),
                length_penalty: overrides.length_penalty.unwrap_or(DEFAULT_LENGTH_PENALTY),
                max_new_tokens: overrides.max_new_tokens.unwrap_or(DEFAULT_MAX_NEW_TOKENS),
                prompt_template: overrides
                    .prompt_template
                    .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
                presence_penalty: overrides
                    .presence_penalty
                    .unwrap_or(DEFAULT_PRESENCE_PENALTY),
            },
        }
    }
}
