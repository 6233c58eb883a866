use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::MistralError, tool::FunctionDefinition};

/// Lower bound the endpoint accepts for `temperature` and `top_p`
pub const MIN_SAMPLING: f64 = 0.1;
/// Upper bound the endpoint accepts for `temperature` and `top_p`
pub const MAX_SAMPLING: f64 = 1.0;

/// `max_tokens` sent for a plain prompt completion when the caller sets none
pub const DEFAULT_TEXT_MAX_TOKENS: u32 = 256;
/// `max_tokens` sent for a chat completion when the caller sets none
pub const DEFAULT_CHAT_MAX_TOKENS: u32 = 1024;

/// Which caller-facing path a request was built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// A single prompt string routed through the chat endpoint
    Text,
    /// A full conversation history
    Chat,
}

impl CompletionKind {
    #[must_use]
    pub fn default_max_tokens(self) -> u32 {
        match self {
            Self::Text => DEFAULT_TEXT_MAX_TOKENS,
            Self::Chat => DEFAULT_CHAT_MAX_TOKENS,
        }
    }
}

/// Clamp `value` into `[min, max]`, both ends inclusive. NaN becomes `min`.
#[must_use]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

fn default_sampling() -> f64 {
    1.0
}

/// Per-call execution settings for a completion request.
///
/// Values are taken as given here; range clamping and defaults for missing
/// values happen when the wire request is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct ExecutionSettings {
    /// Sampling temperature. Higher is more random.
    #[serde(default = "default_sampling", deserialize_with = "lenient::f64")]
    #[builder(default = default_sampling())]
    pub temperature: f64,

    /// Nucleus sampling mass.
    #[serde(default = "default_sampling", deserialize_with = "lenient::f64")]
    #[builder(default = default_sampling())]
    pub top_p: f64,

    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub max_tokens: Option<u32>,

    /// Best-effort deterministic sampling seed.
    #[serde(default, rename = "random_seed", deserialize_with = "lenient::opt_i64")]
    pub seed: Option<i64>,

    /// Ask the provider to prepend its safety prompt.
    #[serde(default, alias = "safe_mode", deserialize_with = "lenient::bool")]
    #[builder(default)]
    pub safe_prompt: bool,

    #[serde(default)]
    #[builder(default)]
    pub tools: Vec<FunctionDefinition>,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExecutionSettings {
    /// Convert a generic settings bag (as handed over by a host) into Mistral settings.
    ///
    /// Numbers may arrive as JSON numbers or numeric strings; unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// [`MistralError::InvalidSettings`] if a known key holds an unconvertible value.
    pub fn from_value(value: Value) -> Result<Self, MistralError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| MistralError::InvalidSettings(e.to_string()))
    }

    /// Settings to use for a call, falling back to defaults when none were given.
    #[must_use]
    pub fn resolve(settings: Option<&Self>) -> Self {
        settings.cloned().unwrap_or_default()
    }
}

/// Deserializers that accept numbers either as JSON numbers or as strings
mod lenient {
    use serde::{Deserialize, Deserializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Bool(bool),
        Int(i64),
        Float(f64),
        Str(String),
    }

    fn float<E: Error>(loose: Loose) -> Result<f64, E> {
        match loose {
            #[allow(clippy::cast_precision_loss)]
            Loose::Int(v) => Ok(v as f64),
            Loose::Float(v) => Ok(v),
            Loose::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("expected a number, got {s:?}"))),
            Loose::Bool(b) => Err(E::custom(format!("expected a number, got {b}"))),
        }
    }

    fn integer<E: Error>(loose: Loose) -> Result<i64, E> {
        match loose {
            Loose::Int(v) => Ok(v),
            #[allow(clippy::cast_possible_truncation)]
            Loose::Float(v) if v.fract() == 0.0 => Ok(v as i64),
            Loose::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("expected an integer, got {s:?}"))),
            other => Err(E::custom(format!(
                "expected an integer, got {}",
                float::<E>(other).map_or_else(|_| "a non-number".to_string(), |v| v.to_string())
            ))),
        }
    }

    pub fn f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        float(Loose::deserialize(deserializer)?)
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        Option::<Loose>::deserialize(deserializer)?
            .map(|loose| {
                let v = integer::<D::Error>(loose)?;
                u32::try_from(v).map_err(|_| D::Error::custom(format!("{v} is out of range")))
            })
            .transpose()
    }

    pub fn opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
        Option::<Loose>::deserialize(deserializer)?
            .map(integer::<D::Error>)
            .transpose()
    }

    pub fn bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Loose::deserialize(deserializer)? {
            Loose::Bool(b) => Ok(b),
            Loose::Str(s) => s
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("expected a boolean, got {s:?}"))),
            Loose::Int(_) | Loose::Float(_) => Err(D::Error::custom("expected a boolean")),
        }
    }
}
