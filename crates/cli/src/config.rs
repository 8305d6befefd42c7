//! Lab configuration file.

use std::path::Path;

use anyhow::{Context, Result};
use evolab_evolution::EvolutionConfig;
use evolab_knowledge::TransferOptions;
use serde::{Deserialize, Serialize};

/// `{ "evolution": {..}, "transfer": {..} }`; both sections are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default)]
    pub evolution: EvolutionConfig,

    #[serde(default)]
    pub transfer: TransferOptions,
}

impl LabConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config
            .evolution
            .validate()
            .with_context(|| format!("invalid evolution settings in {}", path.display()))?;
        config
            .transfer
            .validate()
            .with_context(|| format!("invalid transfer settings in {}", path.display()))?;
        Ok(config)
    }

    /// Load `path` when given, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evolab_evolution::{SelectionMethod, SurvivorMethod};
    use evolab_knowledge::MergeStrategy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let file = write_config(
            r#"{
                "evolution": { "populationSize": 20, "selectionMethod": "rank", "survivorMethod": "bogus" },
                "transfer": { "mergeStrategy": "max" }
            }"#,
        );
        let config = LabConfig::load(file.path()).unwrap();

        assert_eq!(config.evolution.population_size, 20);
        assert_eq!(config.evolution.selection_method, SelectionMethod::Rank);
        assert_eq!(config.evolution.survivor_method, SurvivorMethod::Elitism);
        assert_eq!(config.evolution.genome_length, 10);
        assert_eq!(config.transfer.merge_strategy, MergeStrategy::Max);
        assert_eq!(config.transfer.merge_weight, 0.5);
    }

    #[test]
    fn test_empty_object_is_default() {
        let file = write_config("{}");
        assert_eq!(LabConfig::load(file.path()).unwrap(), LabConfig::default());
        assert_eq!(LabConfig::load_or_default(None).unwrap(), LabConfig::default());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let file = write_config(r#"{ "evolution": { "populationSize": 0 } }"#);
        let err = LabConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid evolution settings"));
    }

    #[test]
    fn test_out_of_range_transfer_weight_is_rejected() {
        let file = write_config(r#"{ "transfer": { "mergeWeight": 2.5 } }"#);
        let err = LabConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid transfer settings"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = LabConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("missing.json"));
    }
}
