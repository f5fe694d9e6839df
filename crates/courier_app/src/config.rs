//! JSON configuration file: loading, first-run default creation and
//! validation.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use courier_engine::{
    OutputFormat, DEFAULT_CONVERTER_TIMEOUT, DEFAULT_IMAGE_CONCURRENCY, DEFAULT_MAX_IMAGE_BYTES,
};
use engine_logging::engine_info;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub karakeep: KarakeepConfig,
    pub kindle: KindleConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default)]
    pub converters: ConvertersConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KarakeepConfig {
    pub api_url: String,
    pub api_key: String,
}

impl Default for KarakeepConfig {
    fn default() -> Self {
        Self {
            api_url: "https://karakeep.example.com/api/v1".into(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindleConfig {
    pub email: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
}

impl Default for KindleConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            smtp_server: "smtp.gmail.com".into(),
            smtp_port: 587,
            smtp_user: String::new(),
            smtp_password: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: String,
    pub output_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "pdf".into(),
            output_dir: "./output".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub max_bytes: u64,
    pub timeout_secs: u64,
    pub concurrency: usize,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            timeout_secs: 15,
            concurrency: DEFAULT_IMAGE_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertersConfig {
    pub timeout_secs: u64,
    pub embedded_epub: bool,
}

impl Default for ConvertersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_CONVERTER_TIMEOUT.as_secs(),
            embedded_epub: true,
        }
    }
}

/// What [`load_or_create`] found at the config path.
#[derive(Debug)]
pub enum ConfigStatus {
    Loaded(Box<AppConfig>),
    /// No file existed; a default one was written and must be edited first.
    CreatedDefault,
}

pub fn load_or_create(path: &Path) -> Result<ConfigStatus> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            write_default(path)?;
            engine_info!("Created default config file: {}", path.display());
            return Ok(ConfigStatus::CreatedDefault);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read config {}", path.display()))
        }
    };
    let config: AppConfig = serde_json::from_str(&text)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    Ok(ConfigStatus::Loaded(Box::new(config)))
}

fn write_default(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&AppConfig::default())?;
    fs::write(path, json + "\n")
        .with_context(|| format!("failed to write default config {}", path.display()))
}

impl AppConfig {
    pub fn output_format(&self) -> Result<OutputFormat> {
        self.output
            .format
            .parse::<OutputFormat>()
            .context("invalid output.format in config")
    }

    /// Everything that talks to the article source needs these.
    pub fn validate_source(&self) -> Result<()> {
        if self.karakeep.api_url.trim().is_empty() {
            bail!("karakeep.api_url is empty; edit the config file");
        }
        if self.karakeep.api_key.trim().is_empty() {
            bail!("karakeep.api_key is empty; edit the config file");
        }
        Ok(())
    }

    /// Everything that sends mail needs these.
    pub fn validate_delivery(&self) -> Result<()> {
        let kindle = &self.kindle;
        let required = [
            ("kindle.email", &kindle.email),
            ("kindle.smtp_server", &kindle.smtp_server),
            ("kindle.smtp_user", &kindle.smtp_user),
            ("kindle.smtp_password", &kindle.smtp_password),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                bail!("{name} is empty; edit the config file");
            }
        }
        if kindle.smtp_port == 0 {
            bail!("kindle.smtp_port must be non-zero");
        }
        Ok(())
    }

    pub fn image_timeout(&self) -> Duration {
        Duration::from_secs(self.images.timeout_secs)
    }

    pub fn converter_timeout(&self) -> Duration {
        Duration::from_secs(self.converters.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> AppConfig {
        let mut config = AppConfig::default();
        config.karakeep.api_key = "key".into();
        config.kindle.email = "reader@kindle.com".into();
        config.kindle.smtp_user = "me@example.com".into();
        config.kindle.smtp_password = "pw".into();
        config
    }

    #[test]
    fn missing_file_creates_default_and_asks_for_edit() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.json");

        let status = load_or_create(&path).unwrap();
        assert!(matches!(status, ConfigStatus::CreatedDefault));

        let written: AppConfig = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, AppConfig::default());
        assert_eq!(written.output.format, "pdf");
        assert_eq!(written.kindle.smtp_port, 587);
    }

    #[test]
    fn optional_sections_take_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "karakeep": {"api_url": "https://k/api/v1", "api_key": "abc"},
                "kindle": {"email": "r@kindle.com", "smtp_server": "smtp.x", "smtp_port": 465,
                           "smtp_user": "u@x", "smtp_password": "p"},
                "output": {"format": "MOBI", "output_dir": "out"},
                "converters": {"timeout_secs": 60}
            }"#,
        )
        .unwrap();

        let ConfigStatus::Loaded(config) = load_or_create(&path).unwrap() else {
            panic!("expected a loaded config");
        };
        assert_eq!(config.images, ImagesConfig::default());
        assert_eq!(config.converters.timeout_secs, 60);
        assert!(config.converters.embedded_epub);
        assert_eq!(config.output_format().unwrap(), OutputFormat::Mobi);
        config.validate_source().unwrap();
        config.validate_delivery().unwrap();
    }

    #[test]
    fn malformed_json_is_an_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(load_or_create(&path).is_err());
    }

    #[test]
    fn validation_names_the_missing_setting() {
        assert!(filled().validate_source().is_ok());
        assert!(filled().validate_delivery().is_ok());

        let mut no_key = filled();
        no_key.karakeep.api_key.clear();
        let err = no_key.validate_source().unwrap_err();
        assert!(err.to_string().contains("api_key"));

        let mut no_recipient = filled();
        no_recipient.kindle.email = "  ".into();
        let err = no_recipient.validate_delivery().unwrap_err();
        assert!(err.to_string().contains("kindle.email"));

        let mut bad_format = filled();
        bad_format.output.format = "docx".into();
        assert!(bad_format.output_format().is_err());
    }
}
