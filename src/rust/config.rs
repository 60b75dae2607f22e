//! Application configuration: an optional TOML file overlaid with
//! `AMYGDALA__SECTION__KEY` environment variables.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::artifact::{ArtifactManager, ArtifactSource};
use crate::export::DEFAULT_LABEL_COLUMN;
use crate::labels::DisplayNames;
use crate::pipeline::DEFAULT_TAIL;
use crate::runtime::RuntimeConfig;
use crate::schema::{FeatureSchema, DENGUE_RISK, VITALS};
use crate::source::DataSource;

/// Built-in feature schemas
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPreset {
    #[default]
    Vitals,
    DengueRisk,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub artifact: ArtifactConfig,
    pub runtime: RuntimeConfig,
    pub export: ExportConfig,
    pub display: DisplayConfig,
}

/// Where batches come from and how often
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Google Sheet id; takes precedence over `url` and `file`
    pub sheet_id: Option<String>,
    /// Any CSV endpoint
    pub url: Option<String>,
    pub file: Option<PathBuf>,
    pub refresh_secs: u64,
    pub cache_ttl_secs: u64,
    pub schema: SchemaPreset,
    /// JSON schema file; overrides `schema`
    pub schema_file: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sheet_id: None,
            url: None,
            file: None,
            refresh_secs: 60,
            cache_ttl_secs: 60,
            schema: SchemaPreset::Vitals,
            schema_file: None,
        }
    }
}

/// Which model artifact to load and where to get it
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// Manifest on disk; when unset the artifact is read from the cache
    pub path: Option<PathBuf>,
    pub name: String,
    pub cache_dir: Option<PathBuf>,
    pub manifest_url: Option<String>,
    pub manifest_sha256: Option<String>,
    pub model_url: Option<String>,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            path: None,
            name: "stress-vitals".to_string(),
            cache_dir: None,
            manifest_url: None,
            manifest_sha256: None,
            model_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub label_column: String,
    /// Written after every successful cycle when set; a `.csv` path
    /// selects CSV over xlsx
    pub path: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
            path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub tail_rows: usize,
    pub color: bool,
    /// Localized names for labels, used only on screen
    pub names: DisplayNames,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tail_rows: DEFAULT_TAIL,
            color: true,
            names: DisplayNames::default(),
        }
    }
}

impl AppConfig {
    /// Loads the file at `path` if given (it must then exist), otherwise
    /// `amygdala.toml` in the working directory if present, then applies
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("amygdala").required(false),
        };
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("AMYGDALA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Load configuration from a specific file only
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.source.refresh_secs.max(1))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.source.cache_ttl_secs)
    }

    pub fn data_source(&self) -> Option<DataSource> {
        if let Some(id) = &self.source.sheet_id {
            return Some(DataSource::google_sheet(id));
        }
        if let Some(url) = &self.source.url {
            return Some(DataSource::Sheet { url: url.clone() });
        }
        self.source.file.as_ref().map(|path| DataSource::file(path.clone()))
    }

    pub fn schema(&self) -> Result<FeatureSchema> {
        match &self.source.schema_file {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read schema file {}", path.display()))?;
                let schema: FeatureSchema = serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse schema file {}", path.display()))?;
                schema.validate()?;
                Ok(schema)
            }
            None => Ok(match self.source.schema {
                SchemaPreset::Vitals => VITALS.clone(),
                SchemaPreset::DengueRisk => DENGUE_RISK.clone(),
            }),
        }
    }

    pub fn artifact_source(&self) -> Option<ArtifactSource> {
        self.artifact.manifest_url.as_ref().map(|url| ArtifactSource {
            name: self.artifact.name.clone(),
            manifest_url: url.clone(),
            manifest_sha256: self.artifact.manifest_sha256.clone(),
            model_url: self.artifact.model_url.clone(),
        })
    }

    pub fn artifact_manager(&self) -> Result<ArtifactManager> {
        let manager = match &self.artifact.cache_dir {
            Some(dir) => ArtifactManager::new(dir),
            None => ArtifactManager::new_default(),
        };
        manager.context("Failed to create artifact cache directory")
    }
}
