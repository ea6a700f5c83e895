//! Config file parsing for `~/.config/images-to-pdf/config.toml`.
//!
//! Pipeline tunables live in [`PipelineConfig`], which is passed explicitly
//! into [`crate::pipeline::convert_directory`]; nothing here is global.

use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// Resolution used to turn pixels into points.
pub const DEFAULT_DPI: f64 = 200.0;
/// Images wider than this are downscaled before encoding.
pub const DEFAULT_TARGET_WIDTH: u32 = 800;
/// Per-image byte ceiling for the quality search.
pub const DEFAULT_SIZE_CEILING_BYTES: u64 = 500 * 1024;
/// Documents above this size get an advisory warning.
pub const DEFAULT_SIZE_REPORT_THRESHOLD_BYTES: u64 = 3 * 1024 * 1024;
pub const DEFAULT_FILE_NAME: &str = "images.pdf";

/// How each image is re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizeMode {
    /// Strategy table decides keep / re-encode / flatten; re-encodes start at
    /// the strategy's quality and go through the bounded size search.
    #[default]
    Strategy,
    /// Every image is re-encoded, starting from the adaptive quality.
    SizeTarget,
}

impl std::str::FromStr for OptimizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strategy" => Ok(OptimizeMode::Strategy),
            "size-target" | "size_target" | "sizetarget" => Ok(OptimizeMode::SizeTarget),
            _ => Err(format!("unknown mode '{}' (expected strategy or size-target)", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_dpi")]
    pub dpi: f64,
    #[serde(default = "default_target_width")]
    pub target_width: u32,
    #[serde(default = "default_size_ceiling")]
    pub size_ceiling_bytes: u64,
    #[serde(default = "default_report_threshold")]
    pub size_report_threshold_bytes: u64,
    #[serde(default)]
    pub mode: OptimizeMode,
}

fn default_dpi() -> f64 {
    DEFAULT_DPI
}
fn default_target_width() -> u32 {
    DEFAULT_TARGET_WIDTH
}
fn default_size_ceiling() -> u64 {
    DEFAULT_SIZE_CEILING_BYTES
}
fn default_report_threshold() -> u64 {
    DEFAULT_SIZE_REPORT_THRESHOLD_BYTES
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            target_width: DEFAULT_TARGET_WIDTH,
            size_ceiling_bytes: DEFAULT_SIZE_CEILING_BYTES,
            size_report_threshold_bytes: DEFAULT_SIZE_REPORT_THRESHOLD_BYTES,
            mode: OptimizeMode::Strategy,
        }
    }
}

impl PipelineConfig {
    /// Reject values that would produce a broken document or drop every image.
    pub fn validate(&self) -> Result<(), SetupError> {
        if !(self.dpi.is_finite() && self.dpi > 0.0) {
            return Err(SetupError::InvalidConfig(format!(
                "dpi must be a positive number, got {}",
                self.dpi
            )));
        }
        if self.target_width == 0 {
            return Err(SetupError::InvalidConfig(
                "target_width must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_file_name")]
    pub file_name: String,
    pub output_dir: Option<String>,
}

fn default_file_name() -> String {
    DEFAULT_FILE_NAME.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_FILE_NAME.to_string(),
            output_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<std::path::PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("images-to-pdf");
        p.push("config.toml");
        p
    })
}

/// Load config from the default path. Missing or malformed files yield defaults.
pub fn load_config() -> AppConfig {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => AppConfig::default(),
    }
}

/// Load config from an explicit path. Missing or malformed files yield defaults.
pub fn load_config_from(path: &std::path::Path) -> AppConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return AppConfig::default(),
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(mut cfg) => {
            if let Err(e) = cfg.pipeline.validate() {
                tracing::warn!(
                    "Ignoring pipeline settings in {}: {}",
                    path.display(),
                    e
                );
                cfg.pipeline = PipelineConfig::default();
            }
            cfg
        }
        Err(e) => {
            tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
            AppConfig::default()
        }
    }
}
