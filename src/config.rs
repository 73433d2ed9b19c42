//! Toolkit configuration
//!
//! Settings are layered: built-in defaults, then a TOML file, then
//! environment variables, then command-line flags. The file is looked up in
//! this order: `--config`, `MFT_CONFIG`, `./mft.toml`,
//! `<config_dir>/mobile-forensic-toolkit/config.toml`.
//!
//! ```toml
//! acquisition_dir = "MFT_Acquisitions"
//!
//! [tools]
//! adb = "adb"
//! idevicebackup2 = "idevicebackup2"
//! ideviceinfo = "ideviceinfo"
//! ileapp = ["python3", "/opt/iLEAPP/ileapp.py"]
//!
//! [ai]
//! provider = "gemini"
//! model = "gemini-1.5-pro-latest"
//!
//! [report]
//! fonts_dir = "/usr/share/fonts/truetype/dejavu"
//! font_family = "DejaVuSans"
//! templates_dir = "/etc/mft/templates"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ToolkitError, ToolkitResult};

/// Default folder holding every case
pub const DEFAULT_ACQUISITION_DIR: &str = "MFT_Acquisitions";

/// Config file name looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "mft.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "MFT_CONFIG";

/// Environment variable overriding the acquisition directory
pub const ACQUISITION_DIR_ENV: &str = "MFT_ACQUISITION_DIR";

/// Environment variable holding the Gemini API key
pub const GOOGLE_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// An external tool: a bare program, or a program followed by fixed arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolCommand {
    Program(String),
    WithArgs(Vec<String>),
}

impl ToolCommand {
    pub fn program(name: &str) -> Self {
        ToolCommand::Program(name.to_string())
    }

    /// Executable to spawn, `None` when unset
    pub fn executable(&self) -> Option<&str> {
        match self {
            ToolCommand::Program(p) => Some(p.as_str()).filter(|p| !p.trim().is_empty()),
            ToolCommand::WithArgs(parts) => parts.first().map(String::as_str),
        }
    }

    /// Arguments placed before the per-invocation arguments
    pub fn leading_args(&self) -> &[String] {
        match self {
            ToolCommand::Program(_) => &[],
            ToolCommand::WithArgs(parts) if !parts.is_empty() => &parts[1..],
            ToolCommand::WithArgs(_) => &[],
        }
    }

    pub fn is_configured(&self) -> bool {
        self.executable().is_some()
    }
}

/// External tool locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub adb: ToolCommand,
    pub idevicebackup2: ToolCommand,
    pub ideviceinfo: ToolCommand,
    /// iLEAPP has no default; it is usually `python3 /path/to/ileapp.py`
    pub ileapp: ToolCommand,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            adb: ToolCommand::program("adb"),
            idevicebackup2: ToolCommand::program("idevicebackup2"),
            ideviceinfo: ToolCommand::program("ideviceinfo"),
            ileapp: ToolCommand::program(""),
        }
    }
}

/// Generative-AI provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProviderKind {
    Gemini,
    Ollama,
}

/// AI assistant settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub provider: AiProviderKind,
    pub model: String,
    /// Overrides the provider's default base URL
    pub endpoint: Option<String>,
    /// Prefer `GOOGLE_API_KEY`; a key in the file is accepted but discouraged
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Upper bound on evidence text sent in one request
    pub max_context_chars: usize,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProviderKind::Gemini,
            model: "gemini-1.5-pro-latest".to_string(),
            endpoint: None,
            api_key: None,
            timeout_secs: 120,
            max_context_chars: 30_000,
        }
    }
}

/// Report fonts and template overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub fonts_dir: Option<PathBuf>,
    /// genpdf family name: `<family>-Regular.ttf`, `<family>-Bold.ttf`, ...
    pub font_family: Option<String>,
    /// Folder with a custom `report.md` Tera template
    pub templates_dir: Option<PathBuf>,
}

/// Full toolkit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolkitConfig {
    pub acquisition_dir: PathBuf,
    pub tools: ToolsConfig,
    pub ai: AiConfig,
    pub report: ReportConfig,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self {
            acquisition_dir: PathBuf::from(DEFAULT_ACQUISITION_DIR),
            tools: ToolsConfig::default(),
            ai: AiConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

/// Values coming from the command line, applied last
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub acquisition_dir: Option<PathBuf>,
}

impl ToolkitConfig {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> ToolkitResult<Self> {
        toml::from_str(text).map_err(|e| ToolkitError::Config(e.to_string()))
    }

    /// Read a TOML file
    pub fn from_file(path: &Path) -> ToolkitResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ToolkitError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
            .map_err(|e| ToolkitError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Build the effective configuration from every layer
    pub fn load(overrides: &ConfigOverrides) -> ToolkitResult<Self> {
        let mut config = match locate_config_file(overrides.config_file.as_deref()) {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration file");
                Self::from_file(&path)?
            }
            None => {
                debug!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.apply_env(|key| std::env::var(key).ok());

        if let Some(dir) = &overrides.acquisition_dir {
            config.acquisition_dir = dir.clone();
        }
        Ok(config)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ACQUISITION_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.acquisition_dir = PathBuf::from(dir);
        }
        if let Some(key) = lookup(GOOGLE_API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.ai.api_key = Some(key);
        }
    }
}

/// Pick the configuration file to read, if any exists
fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("mobile-forensic-toolkit").join("config.toml"))
        .filter(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ToolkitConfig::default();
        assert_eq!(config.acquisition_dir, PathBuf::from("MFT_Acquisitions"));
        assert_eq!(config.tools.adb.executable(), Some("adb"));
        assert!(!config.tools.ileapp.is_configured());
        assert_eq!(config.ai.provider, AiProviderKind::Gemini);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ToolkitConfig::from_toml(
            r#"
            acquisition_dir = "/evidence"

            [tools]
            ileapp = ["python3", "/opt/iLEAPP/ileapp.py"]

            [ai]
            provider = "ollama"
            model = "llama3.2"
            "#,
        )
        .unwrap();

        assert_eq!(config.acquisition_dir, PathBuf::from("/evidence"));
        assert_eq!(config.tools.adb.executable(), Some("adb"));
        assert_eq!(config.tools.ileapp.executable(), Some("python3"));
        assert_eq!(config.tools.ileapp.leading_args(), &["/opt/iLEAPP/ileapp.py".to_string()]);
        assert_eq!(config.ai.provider, AiProviderKind::Ollama);
        assert_eq!(config.ai.timeout_secs, 120);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ToolkitConfig::from_toml("acquisition_dir = [").unwrap_err();
        assert!(matches!(err, ToolkitError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ToolkitConfig::default();
        config.apply_env(|key| match key {
            ACQUISITION_DIR_ENV => Some("/mnt/cases".to_string()),
            GOOGLE_API_KEY_ENV => Some("secret".to_string()),
            _ => None,
        });
        assert_eq!(config.acquisition_dir, PathBuf::from("/mnt/cases"));
        assert_eq!(config.ai.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_load_explicit_file_then_cli_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "acquisition_dir = \"from-file\"\n").unwrap();

        let overrides = ConfigOverrides {
            config_file: Some(path.clone()),
            acquisition_dir: None,
        };
        let loaded = ToolkitConfig::load(&overrides).unwrap();
        // MFT_ACQUISITION_DIR may be set in the environment running the tests
        if std::env::var(ACQUISITION_DIR_ENV).is_err() {
            assert_eq!(loaded.acquisition_dir, PathBuf::from("from-file"));
        }

        let overrides = ConfigOverrides {
            config_file: Some(path),
            acquisition_dir: Some(PathBuf::from("from-cli")),
        };
        assert_eq!(
            ToolkitConfig::load(&overrides).unwrap().acquisition_dir,
            PathBuf::from("from-cli")
        );
    }

    #[test]
    fn test_tool_command_forms() {
        assert_eq!(ToolCommand::program("").executable(), None);
        let empty = ToolCommand::WithArgs(vec![]);
        assert_eq!(empty.executable(), None);
        assert!(empty.leading_args().is_empty());
    }
}
