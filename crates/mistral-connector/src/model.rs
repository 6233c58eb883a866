use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Model ids served by the chat and embedding endpoints.
///
/// Any id string is accepted by the services; this enum only names the
/// common ones.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    IntoStaticStr,
)]
pub enum Model {
    #[strum(to_string = "mistral-tiny")]
    #[serde(rename = "mistral-tiny")]
    MistralTiny,
    #[strum(to_string = "mistral-small-latest")]
    #[serde(rename = "mistral-small-latest")]
    MistralSmallLatest,
    #[strum(to_string = "mistral-medium-latest")]
    #[serde(rename = "mistral-medium-latest")]
    MistralMediumLatest,
    #[strum(to_string = "mistral-large-latest")]
    #[serde(rename = "mistral-large-latest")]
    MistralLargeLatest,
    #[strum(to_string = "open-mistral-7b")]
    #[serde(rename = "open-mistral-7b")]
    OpenMistral7b,
    #[strum(to_string = "open-mixtral-8x7b")]
    #[serde(rename = "open-mixtral-8x7b")]
    OpenMixtral8x7b,
    #[strum(to_string = "open-mixtral-8x22b")]
    #[serde(rename = "open-mixtral-8x22b")]
    OpenMixtral8x22b,
    #[strum(to_string = "codestral-latest")]
    #[serde(rename = "codestral-latest")]
    CodestralLatest,

    // Embeddings
    #[strum(to_string = "mistral-embed")]
    #[serde(rename = "mistral-embed")]
    MistralEmbed,
}

impl Model {
    /// Whether the model serves `v1/embeddings` rather than chat
    pub fn is_embedding(self) -> bool {
        matches!(self, Self::MistralEmbed)
    }
}

impl From<Model> for String {
    fn from(model: Model) -> Self {
        model.to_string()
    }
}
