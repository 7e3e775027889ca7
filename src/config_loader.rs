//! Layered configuration: compiled defaults, then `sarforge.toml`, then
//! `SARFORGE_`-prefixed environment variables. Every tunable of the detection
//! and validation algorithms lives here rather than as a literal at the use
//! site.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::generation::GenerationConfig;
use crate::pattern_detector::DetectionConfig;
use crate::pipeline::PipelineConfig;
use crate::validator::ValidationConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarConfig {
    /// Path of the sled database backing the reference audit store.
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

fn default_store_path() -> String {
    "./sarforge_db".to_string()
}

impl Default for SarConfig {
    fn default() -> Self {
        SarConfig {
            store_path: default_store_path(),
            detection: DetectionConfig::default(),
            validation: ValidationConfig::default(),
            pipeline: PipelineConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

pub fn load_config() -> Result<SarConfig, figment::Error> {
    load_config_from("sarforge.toml")
}

pub fn load_config_from(path: &str) -> Result<SarConfig, figment::Error> {
    Figment::from(Serialized::defaults(SarConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SARFORGE_"))
        .extract()
}
