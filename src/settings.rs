use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::WeightError;

/// How the host matches file points to mesh vertices on import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMethod {
    #[default]
    Index,
    Nearest,
    Over,
    Barycentric,
    Bilinear,
}

impl ImportMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMethod::Index => "index",
            ImportMethod::Nearest => "nearest",
            ImportMethod::Over => "over",
            ImportMethod::Barycentric => "barycentric",
            ImportMethod::Bilinear => "bilinear",
        }
    }
}

impl fmt::Display for ImportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportMethod {
    type Err = WeightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "index" => Ok(ImportMethod::Index),
            "nearest" => Ok(ImportMethod::Nearest),
            "over" => Ok(ImportMethod::Over),
            "barycentric" => Ok(ImportMethod::Barycentric),
            "bilinear" => Ok(ImportMethod::Bilinear),
            other => Err(WeightError::Precondition(format!(
                "unknown import method: {other}"
            ))),
        }
    }
}

/// What to do when an export would replace an existing file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    #[default]
    Ask,
    Always,
    Never,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    pub method: ImportMethod,
    /// Delete remapped temp files once the import has consumed them.
    pub clean_up: bool,
    /// Where remapped files are staged; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            method: ImportMethod::Index,
            clean_up: true,
            temp_dir: None,
        }
    }
}

impl ImportOptions {
    pub fn staging_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("weightmap"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub overwrite: OverwritePolicy,
}

/// Persisted tool settings used by CLI and batch workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub import: ImportOptions,
    pub export: ExportOptions,
    /// Influences allowed per vertex before pruning.
    pub influence_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            import: ImportOptions::default(),
            export: ExportOptions::default(),
            influence_limit: 4,
        }
    }
}

/// Save settings to a JSON file.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    let content =
        serde_json::to_string_pretty(settings).context("failed to serialize settings as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save settings: {}", path.display()))?;
    Ok(())
}

/// Load settings from a JSON file.
pub fn load_settings(path: &Path) -> Result<Settings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load settings: {}", path.display()))?;
    let settings: Settings =
        serde_json::from_str(&content).context("failed to parse settings JSON")?;
    Ok(settings)
}
