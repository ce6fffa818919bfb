// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Relay configuration via `config.yml`.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::ConfigNode;
use crate::core::distributor::{DEFAULT_MIN_CYCLE, DistributorConfig};
use crate::core::{RelayError, Result};

/// Distributor tuning from the optional `distributor` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DistributorSettings {
    /// Minimum time per distribution cycle, in milliseconds.
    #[serde(default)]
    pub min_cycle_ms: Option<u64>,
}

impl DistributorSettings {
    pub fn to_distributor_config(&self) -> DistributorConfig {
        DistributorConfig {
            min_cycle: self
                .min_cycle_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_MIN_CYCLE),
            ..DistributorConfig::default()
        }
    }
}

/// Top-level relay configuration.
///
/// Sections are kept as generic nodes; the endpoint, link and filter
/// managers interpret them item by item so one bad item never sinks the
/// rest of its section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RelayConfig {
    /// Bot definitions. Each needs a `name`; the rest is up to the bot.
    #[serde(default)]
    pub bots: Vec<ConfigNode>,

    /// Endpoint items (`type`, `name`, optional `extra`, type-specific fields).
    #[serde(default)]
    pub endpoints: Vec<ConfigNode>,

    /// Link entries (`source`, `target`, optional `bidirectional`, `filters`).
    #[serde(default)]
    pub links: Vec<ConfigNode>,

    /// Named filter templates that link filter lists can reference by name.
    #[serde(default)]
    pub repeatable_filters: serde_json::Map<String, ConfigNode>,

    #[serde(default)]
    pub distributor: DistributorSettings,
}

impl RelayConfig {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "config.yml";

    /// Load `config.yml` from a directory.
    pub fn load(dir: &Path) -> Result<Self> {
        Self::from_file(&dir.join(Self::FILE_NAME))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::from_yaml_str(&content).map_err(|e| match e {
            RelayError::Config(reason) => {
                RelayError::Config(format!("Failed to parse {}: {}", path.display(), reason))
            }
            other => other,
        })?;

        tracing::info!("Loaded relay config from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| RelayError::Config(e.to_string()))
    }

    /// The relay cannot do anything useful without bots, endpoints and links.
    pub fn validate_structure(&self) -> Result<()> {
        if self.bots.is_empty() {
            return Err(RelayError::ConfigStructure(
                "No bots defined! Add at least one entry under 'bots'".into(),
            ));
        }
        if self.endpoints.is_empty() {
            return Err(RelayError::ConfigStructure(
                "No endpoints defined! Add at least one entry under 'endpoints'".into(),
            ));
        }
        if self.links.is_empty() {
            return Err(RelayError::ConfigStructure(
                "No links defined! Endpoints are useless without them".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const SAMPLE: &str = r##"
repeatable-filters:
  no-bots:
    type: regex
    pattern: "^!"
bots:
  - name: main
    host: irc.example.net
endpoints:
  - type: irc
    name: Lobby
    extra:
      bot: main
      channel: "#lobby"
links:
  - source: lobby
    target: lobby-mirror
    bidirectional: true
    filters:
      - no-bots
distributor:
  min-cycle-ms: 10
"##;

    #[test]
    fn test_parse_sections() {
        let config = RelayConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.bots.len(), 1);
        assert_eq!(config.endpoints.len(), 1);
        assert_eq!(config.links.len(), 1);
        assert!(config.repeatable_filters.contains_key("no-bots"));
        assert_eq!(config.distributor.min_cycle_ms, Some(10));
        assert_eq!(
            config.distributor.to_distributor_config().min_cycle,
            Duration::from_millis(10)
        );
        config.validate_structure().unwrap();
    }

    #[test]
    fn test_default_min_cycle() {
        let settings = DistributorSettings::default();
        assert_eq!(settings.to_distributor_config().min_cycle, DEFAULT_MIN_CYCLE);
    }

    #[test]
    fn test_missing_sections_are_structure_errors() {
        let config = RelayConfig::from_yaml_str("bots: [{name: a}]\nendpoints: []\n").unwrap();
        let err = config.validate_structure().unwrap_err();
        assert!(matches!(err, RelayError::ConfigStructure(ref m) if m.contains("endpoints")));

        let config = RelayConfig::from_yaml_str("{}").unwrap();
        assert!(matches!(
            config.validate_structure(),
            Err(RelayError::ConfigStructure(m)) if m.contains("bots")
        ));

        let config =
            RelayConfig::from_yaml_str("bots: [{name: a}]\nendpoints: [{type: irc}]\n").unwrap();
        assert!(matches!(
            config.validate_structure(),
            Err(RelayError::ConfigStructure(m)) if m.contains("links")
        ));
    }

    #[test]
    fn test_malformed_section_is_config_error() {
        let result = RelayConfig::from_yaml_str("endpoints: not-a-list\n");
        assert!(matches!(result, Err(RelayError::Config(_))));
    }

    #[test]
    fn test_load_from_dir() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join(RelayConfig::FILE_NAME)).unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let config = RelayConfig::load(dir.path()).unwrap();
        assert_eq!(config.endpoints.len(), 1);
    }

    #[test]
    fn test_load_missing_file_returns_error() {
        let dir = TempDir::new().unwrap();
        let result = RelayConfig::load(dir.path());
        assert!(matches!(result, Err(RelayError::Config(m)) if m.contains("Failed to read")));
    }
}
