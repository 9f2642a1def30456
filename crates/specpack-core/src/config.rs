//! Engine configuration

use serde::{Deserialize, Serialize};
use specpack_artifact::{ArchiveOptions, Compression, FORMAT_VERSION};
use specpack_governance::GovernanceConfig;

/// Engine configuration
///
/// Loadable from TOML; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Application version stamped into provenance
    pub app_version: String,
    /// Archive format version stamped into provenance
    pub format_version: String,
    /// Member compression for produced archives
    pub compression: Compression,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown values,
    /// [`ConfigError::Invalid`] on empty version strings
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// With application version
    #[inline]
    #[must_use]
    pub fn with_app_version(mut self, version: impl Into<String>) -> Self {
        self.app_version = version.into();
        self
    }

    /// With compression
    #[inline]
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// With default log filter
    #[inline]
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Archive options derived from this configuration
    #[inline]
    #[must_use]
    pub fn archive_options(&self) -> ArchiveOptions {
        ArchiveOptions::with_compression(self.compression)
    }

    /// Governance configuration derived from this configuration
    #[must_use]
    pub fn governance(&self) -> GovernanceConfig {
        let mut config = GovernanceConfig::new()
            .with_app_version(self.app_version.clone())
            .with_archive_options(self.archive_options());
        config.format_version.clone_from(&self.format_version);
        config
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.app_version.trim().is_empty() {
            return Err(ConfigError::Invalid("app_version must not be empty".to_string()));
        }
        if self.format_version.trim().is_empty() {
            return Err(ConfigError::Invalid("format_version must not be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_version: concat!("specpack/", env!("CARGO_PKG_VERSION")).to_string(),
            format_version: FORMAT_VERSION.to_string(),
            compression: Compression::default(),
            log_filter: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed into a configuration
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed values are unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_toml_yields_defaults() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let config = EngineConfig::from_toml_str(
            r#"
            app_version = "studio/2.1"
            compression = "stored"
            "#,
        )
        .unwrap();
        assert_eq!(config.app_version, "studio/2.1");
        assert_eq!(config.compression, Compression::Stored);
        assert_eq!(config.format_version, FORMAT_VERSION);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn unknown_compression_is_rejected() {
        let err = EngineConfig::from_toml_str(r#"compression = "zstd""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn blank_version_is_rejected() {
        let err = EngineConfig::from_toml_str(r#"app_version = " ""#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn governance_config_carries_versions() {
        let config = EngineConfig::new()
            .with_app_version("studio/3")
            .with_compression(Compression::Stored);
        let gov = config.governance();
        assert_eq!(gov.app_version, "studio/3");
        assert_eq!(gov.format_version, FORMAT_VERSION);
        assert_eq!(gov.archive, config.archive_options());
    }
}
