use serde::{Deserialize, Serialize};
use tch::Device;

use crate::pipelines::sentence_embeddings::layers::PoolingConfig;
use crate::{Config, SimilarityError};

/// # Configuration for sentence similarity
///
/// Contains the pooling layer definition, whether sentence vectors are L2-normalized
/// before computing similarities, and the device to run the computation on.
#[derive(Debug, Clone)]
pub struct SentenceSimilarityConfig {
    /// Pooling layer configuration
    pub pooling_config: PoolingConfig,
    /// L2-normalize sentence vectors after pooling
    pub normalize_embeddings: bool,
    /// Device to place the computation on
    pub device: Device,
}

impl Default for SentenceSimilarityConfig {
    fn default() -> SentenceSimilarityConfig {
        SentenceSimilarityConfig {
            pooling_config: PoolingConfig::default(),
            normalize_embeddings: false,
            device: Device::Cpu,
        }
    }
}

/// Configuration for the modules that define the model's layers (`modules.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceEmbeddingsModulesConfig(pub Vec<SentenceEmbeddingsModuleConfig>);

impl std::ops::Deref for SentenceEmbeddingsModulesConfig {
    type Target = Vec<SentenceEmbeddingsModuleConfig>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<SentenceEmbeddingsModuleConfig>> for SentenceEmbeddingsModulesConfig {
    fn from(source: Vec<SentenceEmbeddingsModuleConfig>) -> Self {
        Self(source)
    }
}

impl Config for SentenceEmbeddingsModulesConfig {}

impl SentenceEmbeddingsModulesConfig {
    /// Checks that the modules describe a transformer followed by a pooling layer, with at
    /// most a normalization layer after it. Dense projections are not supported.
    pub fn validate(self) -> Result<Self, SimilarityError> {
        match self.get(0) {
            Some(SentenceEmbeddingsModuleConfig {
                module_type: SentenceEmbeddingsModuleType::Transformer,
                ..
            }) => (),
            Some(_) => {
                return Err(SimilarityError::InvalidConfigurationError(
                    "First module defined in modules.json must be a Transformer".to_string(),
                ));
            }
            None => {
                return Err(SimilarityError::InvalidConfigurationError(
                    "No modules found in modules.json".to_string(),
                ));
            }
        }

        match self.get(1) {
            Some(SentenceEmbeddingsModuleConfig {
                module_type: SentenceEmbeddingsModuleType::Pooling,
                ..
            }) => (),
            Some(_) => {
                return Err(SimilarityError::InvalidConfigurationError(
                    "Second module defined in modules.json must be a Pooling".to_string(),
                ));
            }
            None => {
                return Err(SimilarityError::InvalidConfigurationError(
                    "Pooling module not found in second position in modules.json".to_string(),
                ));
            }
        }

        if let Some(module) = self.iter().skip(2).find(|module| {
            !matches!(module.module_type, SentenceEmbeddingsModuleType::Normalize)
        }) {
            return Err(SimilarityError::InvalidConfigurationError(format!(
                "Unsupported module {:?} after pooling in modules.json",
                module.module_type
            )));
        }

        Ok(self)
    }

    /// Pooling module, in second position of a validated configuration
    pub fn pooling_module(&self) -> Option<&SentenceEmbeddingsModuleConfig> {
        self.get(1)
    }

    pub fn has_normalization(&self) -> bool {
        self.iter()
            .skip(2)
            .any(|module| matches!(module.module_type, SentenceEmbeddingsModuleType::Normalize))
    }
}

/// Configuration defining a single module (model's layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentenceEmbeddingsModuleConfig {
    pub idx: usize,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    #[serde(with = "serde_sentence_embeddings_module_type")]
    pub module_type: SentenceEmbeddingsModuleType,
}

/// Available module types, based on Sentence-Transformers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SentenceEmbeddingsModuleType {
    Transformer,
    Pooling,
    Dense,
    Normalize,
}

mod serde_sentence_embeddings_module_type {
    use super::SentenceEmbeddingsModuleType;
    use serde::{de, Deserializer, Serializer};

    pub fn serialize<S>(
        module_type: &SentenceEmbeddingsModuleType,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("sentence_transformers.models.{:?}", module_type))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SentenceEmbeddingsModuleType, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SentenceEmbeddingsModuleTypeVisitor;

        impl de::Visitor<'_> for SentenceEmbeddingsModuleTypeVisitor {
            type Value = SentenceEmbeddingsModuleType;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a sentence embeddings module type")
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<Self::Value, E> {
                s.split('.')
                    .last()
                    .map(|s| serde_json::from_value(serde_json::Value::String(s.to_string())))
                    .transpose()
                    .map_err(de::Error::custom)?
                    .ok_or_else(|| format!("Invalid SentenceEmbeddingsModuleType: {}", s))
                    .map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(SentenceEmbeddingsModuleTypeVisitor)
    }
}
