use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::default_configs;
use crate::config::env_vars::expand_env_vars;
use crate::constants::{DEFAULT_COMMAND_TIMEOUT_SECS, MAX_COMMAND_TIMEOUT_SECS};
use crate::models::{Domain, ToolTier};

/// One entry in the forensic tool table.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolEntry {
    pub name: String,
    pub domain: Domain,
    pub tier: ToolTier,
    /// Explicit location; when absent the tool is resolved via the search path
    #[serde(default)]
    pub path: Option<String>,
}

/// Session-independent configuration for evidence collection and custody
/// tracking.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustodyConfig {
    pub version: String,
    pub investigator_id: String,
    pub investigator_name: String,
    pub organization: String,
    pub evidence_dir: String,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    pub tools: Vec<ToolEntry>,
    #[serde(default)]
    pub log_paths: Vec<String>,
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

impl Default for CustodyConfig {
    fn default() -> Self {
        match std::env::consts::OS {
            "windows" => default_configs::default_windows(),
            "linux" => default_configs::default_linux(),
            "macos" => default_configs::default_macos(),
            _ => default_configs::default_minimal(),
        }
    }
}

impl CustodyConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: CustodyConfig =
            serde_yaml::from_str(&content).context("Failed to parse YAML config")?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write config to {}", path.display()))?;

        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Expand environment variables in configured paths.
    ///
    /// Handles both Windows (`%VAR%`) and Unix (`$VAR`) style variables in the
    /// evidence directory, tool locations and log paths.
    pub fn process_environment_variables(&mut self) {
        self.evidence_dir = expand_env_vars(&self.evidence_dir);

        for tool in &mut self.tools {
            if let Some(path) = &tool.path {
                tool.path = Some(expand_env_vars(path));
            }
        }

        for log_path in &mut self.log_paths {
            *log_path = expand_env_vars(log_path);
        }
    }

    /// Validate critical configuration, returning every problem found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.investigator_id.trim().is_empty() {
            problems.push("investigator_id is empty".to_string());
        }
        if self.evidence_dir.trim().is_empty() {
            problems.push("evidence_dir is empty".to_string());
        }
        if self.command_timeout_secs == 0 {
            problems.push("command_timeout_secs must be at least 1".to_string());
        }
        if self.command_timeout_secs > MAX_COMMAND_TIMEOUT_SECS {
            problems.push(format!(
                "command_timeout_secs {} exceeds the maximum of {}",
                self.command_timeout_secs, MAX_COMMAND_TIMEOUT_SECS
            ));
        }
        if self.tools.is_empty() {
            problems.push("tool table is empty".to_string());
        }

        problems
    }

    /// Per-command timeout, clamped to the supported range.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.clamp(1, MAX_COMMAND_TIMEOUT_SECS))
    }

    /// Tools configured for one domain.
    pub fn tools_for_domain(&self, domain: Domain) -> impl Iterator<Item = &ToolEntry> {
        self.tools.iter().filter(move |t| t.domain == domain)
    }
}

/// Load a config from the given path, or fall back to the OS default.
pub fn load_or_create_config(path: Option<&Path>) -> Result<CustodyConfig> {
    match path {
        Some(p) => CustodyConfig::from_yaml_file(p),
        None => {
            debug!("No config file given, using built-in defaults for this OS");
            Ok(CustodyConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = CustodyConfig::default();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
        assert!(!config.tools.is_empty());
    }

    #[test]
    fn test_default_has_both_tiers_per_domain() {
        let config = CustodyConfig::default();
        for domain in Domain::ALL {
            let has_core = config
                .tools_for_domain(domain)
                .any(|t| t.tier == ToolTier::Core);
            let has_advanced = config
                .tools_for_domain(domain)
                .any(|t| t.tier == ToolTier::Advanced);
            assert!(has_core, "no core tools for {}", domain);
            assert!(has_advanced, "no advanced tools for {}", domain);
        }
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custodian.yaml");

        let config = CustodyConfig::default();
        config.save_to_yaml_file(&path).unwrap();

        let restored = CustodyConfig::from_yaml_file(&path).unwrap();
        assert_eq!(restored.version, config.version);
        assert_eq!(restored.tools.len(), config.tools.len());
        assert_eq!(restored.command_timeout_secs, config.command_timeout_secs);
    }

    #[test]
    fn test_validate_flags_problems() {
        let mut config = CustodyConfig::default();
        config.investigator_id = String::new();
        config.command_timeout_secs = 600;
        config.tools.clear();

        let problems = config.validate();
        assert_eq!(problems.len(), 3);
    }

    #[test]
    fn test_timeout_clamped() {
        let mut config = CustodyConfig::default();
        config.command_timeout_secs = 3600;
        assert_eq!(config.command_timeout(), Duration::from_secs(60));

        config.command_timeout_secs = 0;
        assert_eq!(config.command_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_process_environment_variables() {
        std::env::set_var("CUSTODIAN_CFG_TEST", "/custom/evidence");
        let mut config = CustodyConfig::default();
        config.evidence_dir = "$CUSTODIAN_CFG_TEST/out".to_string();
        config.process_environment_variables();
        assert_eq!(config.evidence_dir, "/custom/evidence/out");
    }

    #[test]
    fn test_load_or_create_without_path_uses_default() {
        let config = load_or_create_config(None).unwrap();
        assert!(!config.tools.is_empty());
    }
}
