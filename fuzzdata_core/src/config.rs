use crate::replay::{Step, default_recipe};
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct ReplaySettings {
    #[serde(default)]
    pub pretty: bool,
    #[serde(default)]
    pub stop_on_exhaustion: bool,
    #[serde(default = "default_recipe")]
    pub steps: Vec<Step>,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            pretty: false,
            stop_on_exhaustion: false,
            steps: default_recipe(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct FuzzdataConfig {
    #[serde(default)]
    pub replay: ReplaySettings,
}

impl FuzzdataConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file at {:?}: {}", path, e))?;

        Self::from_toml_str(&content).map_err(|e| {
            anyhow::anyhow!("Failed to parse TOML from config file {:?}: {}", path, e)
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_config_uses_default_recipe() {
        let config = FuzzdataConfig::from_toml_str("").unwrap();
        assert_eq!(config, FuzzdataConfig::default());
        assert_eq!(config.replay.steps, default_recipe());
        assert!(!config.replay.pretty);
    }

    #[test]
    fn replay_section_without_steps_keeps_default_recipe() {
        let config = FuzzdataConfig::from_toml_str("[replay]\npretty = true\n").unwrap();
        assert!(config.replay.pretty);
        assert_eq!(config.replay.steps, default_recipe());
    }

    #[test]
    fn custom_recipe_replaces_default() {
        let config = FuzzdataConfig::from_toml_str(
            r#"
            [replay]
            stop-on-exhaustion = true

            [[replay.steps]]
            kind = "random-string"

            [[replay.steps]]
            kind = "memory-file"
            as-bytes = false
            "#,
        )
        .unwrap();
        assert!(config.replay.stop_on_exhaustion);
        assert_eq!(
            config.replay.steps,
            vec![
                Step::RandomString,
                Step::MemoryFile {
                    all_data: false,
                    as_bytes: false
                }
            ]
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(FuzzdataConfig::from_toml_str("[replay]\nthreads = 4\n").is_err());
        assert!(FuzzdataConfig::from_toml_str("[fuzzer]\n").is_err());
    }

    #[test]
    fn load_from_file_reports_path_on_failure() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("fuzzdata.toml");
        let err = FuzzdataConfig::load_from_file(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));

        std::fs::write(&missing, "[replay\n").unwrap();
        let err = FuzzdataConfig::load_from_file(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML"));

        std::fs::write(&missing, "[replay]\npretty = true\n").unwrap();
        assert!(FuzzdataConfig::load_from_file(&missing).unwrap().replay.pretty);
    }
}
