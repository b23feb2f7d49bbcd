use octofhir_db_memory::StorageConfig;
use octofhir_elements::ValidationOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Valueset lookup service
    #[serde(default)]
    pub terminology: TerminologySettings,
    /// Element validation knobs
    #[serde(default)]
    pub validation: ValidationOptions,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Constraints applied over the built-in profiles
    #[serde(default)]
    pub profiles: ProfileSettings,
    #[serde(default, skip_serializing)]
    pub storage: StorageConfig,
}

// Default derived via field defaults

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Terminology validation
        if self.terminology.enabled {
            let url = url::Url::parse(&self.terminology.base_url)
                .map_err(|e| format!("terminology.base_url is not a valid URL: {e}"))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err("terminology.base_url must use http or https".into());
            }
            if self.terminology.timeout_ms == 0 {
                return Err("terminology.timeout_ms must be > 0".into());
            }
        }
        // Validation settings
        if let Some(empty) = self
            .validation
            .extra_code_systems
            .iter()
            .position(|s| s.trim().is_empty())
        {
            return Err(format!("validation.extra_code_systems[{empty}] must not be empty"));
        }
        // Profile settings
        if let Some(empty) = self
            .profiles
            .structure_definitions
            .iter()
            .position(|p| p.as_os_str().is_empty())
        {
            return Err(format!("profiles.structure_definitions[{empty}] must not be empty"));
        }
        Ok(())
    }

    pub fn terminology_timeout(&self) -> Duration {
        Duration::from_millis(self.terminology.timeout_ms)
    }
}

/// Terminology service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminologySettings {
    /// When false, valueset bindings are not checked
    #[serde(default = "default_terminology_enabled")]
    pub enabled: bool,
    /// Base URL; lookups go to `{base_url}/{valueset}/?code={code}`
    #[serde(default = "default_terminology_base_url")]
    pub base_url: String,
    #[serde(default = "default_terminology_timeout_ms")]
    pub timeout_ms: u64,
}
fn default_terminology_enabled() -> bool {
    true
}
fn default_terminology_base_url() -> String {
    "http://localhost:8000/valuesets".into()
}
fn default_terminology_timeout_ms() -> u64 {
    5_000
}
impl Default for TerminologySettings {
    fn default() -> Self {
        Self {
            enabled: default_terminology_enabled(),
            base_url: default_terminology_base_url(),
            timeout_ms: default_terminology_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfileSettings {
    /// StructureDefinition XML files, applied in order at startup
    #[serde(default)]
    pub structure_definitions: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("octofhir.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., OCTOFHIR__TERMINOLOGY__TIMEOUT_MS=2000
        builder = builder.add_source(
            Environment::with_prefix("OCTOFHIR")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, String> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}
