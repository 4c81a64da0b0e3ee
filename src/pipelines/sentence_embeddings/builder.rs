use std::path::PathBuf;

use tch::Device;

use crate::pipelines::sentence_embeddings::layers::PoolingConfig;
use crate::pipelines::sentence_embeddings::{
    SentenceEmbeddingsModulesConfig, SentenceSimilarityConfig, SentenceSimilarityModel,
};
use crate::{Config, SimilarityError};

/// # SentenceSimilarity Model Builder
///
/// Allows the user to build a model either from the files of a standard
/// Sentence-Transformers model directory (`modules.json` and the pooling configuration)
/// or from an explicit configuration.
pub struct SentenceSimilarityBuilder<T> {
    device: Device,
    inner: T,
}

impl<T> SentenceSimilarityBuilder<T> {
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }
}

pub struct Local {
    model_dir: PathBuf,
}

impl SentenceSimilarityBuilder<Local> {
    pub fn local<P: Into<PathBuf>>(model_dir: P) -> Self {
        Self {
            device: Device::Cpu,
            inner: Local {
                model_dir: model_dir.into(),
            },
        }
    }

    pub fn create_model(self) -> Result<SentenceSimilarityModel, SimilarityError> {
        let model_dir = self.inner.model_dir;

        let modules =
            SentenceEmbeddingsModulesConfig::from_file(model_dir.join("modules.json"))?.validate()?;
        let pooling_module = modules.pooling_module().ok_or_else(|| {
            SimilarityError::InvalidConfigurationError(
                "Pooling module not found in modules.json".to_string(),
            )
        })?;
        let pooling_config =
            PoolingConfig::from_file(model_dir.join(&pooling_module.path).join("config.json"))?;

        let config = SentenceSimilarityConfig {
            pooling_config,
            normalize_embeddings: modules.has_normalization(),
            device: self.device,
        };

        SentenceSimilarityModel::new(config)
    }
}

pub struct Custom {
    config: SentenceSimilarityConfig,
}

impl SentenceSimilarityBuilder<Custom> {
    pub fn new() -> Self {
        Self {
            device: Device::Cpu,
            inner: Custom {
                config: SentenceSimilarityConfig::default(),
            },
        }
    }

    pub fn pooling_config(mut self, pooling_config: PoolingConfig) -> Self {
        self.inner.config.pooling_config = pooling_config;
        self
    }

    pub fn normalize_embeddings(mut self, normalize_embeddings: bool) -> Self {
        self.inner.config.normalize_embeddings = normalize_embeddings;
        self
    }

    pub fn create_model(mut self) -> Result<SentenceSimilarityModel, SimilarityError> {
        self.inner.config.device = self.device;
        SentenceSimilarityModel::new(self.inner.config)
    }
}

impl Default for SentenceSimilarityBuilder<Custom> {
    fn default() -> Self {
        Self::new()
    }
}
