//! Engine configuration module.
//!
//! Handles loading, validating, and merging the engine's TOML configuration.
//! Stock defaults are overridden by a single user file passed with `--config`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [density]
//! nominal = 72              # Density at which vector page sizes are measured
//! max = 1200                # Highest density the rasterizer may be asked for
//! step = 300                # Densities are rounded up to multiples of this
//!
//! [processing]
//! concurrent_transformations = 4  # Omit for auto = CPU cores
//! timeout_secs = 30               # Omit to wait indefinitely
//!
//! [transformers.rust]
//! enabled = true
//! priority = 0
//!
//! [transformers.imagemagick]
//! enabled = true
//! priority = 10
//! path = ""                 # Directory of the binaries; empty = $PATH
//! ghostscript = false       # Ghostscript installed (EPS/PDF support)
//! graphicsmagick = false    # Use `gm` instead of ImageMagick
//! quality = 85              # Default JPEG/WebP quality
//! ```
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::imaging::{DensitySettings, MagickSettings, Quality};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Engine configuration.
///
/// All fields have defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Rasterization density for scalable sources.
    pub density: DensityConfig,
    /// Concurrency and timeouts.
    pub processing: ProcessingConfig,
    /// Per-transformer registration settings.
    pub transformers: TransformersConfig,
}

impl EngineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let density = &self.density;
        if density.nominal == 0 || density.max == 0 || density.step == 0 {
            return Err(ConfigError::Validation(
                "density.nominal, density.max and density.step must be non-zero".into(),
            ));
        }
        if density.nominal > density.max {
            return Err(ConfigError::Validation(
                "density.nominal must not exceed density.max".into(),
            ));
        }
        if self.processing.concurrent_transformations == Some(0) {
            return Err(ConfigError::Validation(
                "processing.concurrent_transformations must be at least 1".into(),
            ));
        }
        if self.processing.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "processing.timeout_secs must be at least 1 (omit it to disable)".into(),
            ));
        }
        let quality = self.transformers.imagemagick.quality;
        if !(1..=100).contains(&quality) {
            return Err(ConfigError::Validation(
                "transformers.imagemagick.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }

    pub fn density_settings(&self) -> DensitySettings {
        DensitySettings {
            nominal: self.density.nominal,
            max: self.density.max,
            step: self.density.step,
        }
    }

    pub fn magick_settings(&self) -> MagickSettings {
        let magick = &self.transformers.imagemagick;
        MagickSettings {
            path: magick.path.clone(),
            ghostscript: magick.ghostscript,
            graphicsmagick: magick.graphicsmagick,
            quality: Quality::new(magick.quality),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.processing.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DensityConfig {
    pub nominal: u32,
    pub max: u32,
    pub step: u32,
}

impl Default for DensityConfig {
    fn default() -> Self {
        let settings = DensitySettings::default();
        Self {
            nominal: settings.nominal,
            max: settings.max,
            step: settings.step,
        }
    }
}

/// Concurrency settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum transformations running at once. Defaults to CPU cores.
    pub concurrent_transformations: Option<usize>,
    /// Give up on a transformation (including its wait for a slot) after this.
    pub timeout_secs: Option<u64>,
}

/// Resolve the effective number of concurrent transformations.
///
/// - If user specified a value, cap it at the number of available cores.
/// - Otherwise, use all available cores.
pub fn effective_concurrency(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .concurrent_transformations
        .map(|n| n.min(cores))
        .unwrap_or(cores)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransformersConfig {
    pub rust: RustConfig,
    pub imagemagick: ImageMagickConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RustConfig {
    pub enabled: bool,
    pub priority: i32,
}

impl Default for RustConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageMagickConfig {
    pub enabled: bool,
    pub priority: i32,
    /// Directory holding `convert`/`identify` (or `gm`). Empty = `$PATH`.
    pub path: PathBuf,
    pub ghostscript: bool,
    pub graphicsmagick: bool,
    pub quality: u32,
}

impl Default for ImageMagickConfig {
    fn default() -> Self {
        let settings = MagickSettings::default();
        Self {
            enabled: true,
            priority: 10,
            path: settings.path,
            ghostscript: settings.ghostscript,
            graphicsmagick: settings.graphicsmagick,
            quality: settings.quality.value(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Serialize stock defaults as a TOML value tree.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(EngineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto `base`, deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<EngineConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: EngineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the engine config: stock defaults, overridden by `path` if given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = path.map(load_raw_config).transpose()?;
    resolve_config(base, overlay)
}

/// A documented stock `config.toml` with all keys and explanations.
pub fn stock_config_toml() -> &'static str {
    r##"# Variant Engine Configuration
# ============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Rasterization density for vector sources (SVG, EPS, PDF)
# ---------------------------------------------------------------------------
[density]
# Density at which page sizes are reported (units per inch).
nominal = 72

# Highest density the rasterizer may be asked for.
max = 1200

# Densities are rounded up to a multiple of this value.
step = 300

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum transformations running at once; extra requests wait for a slot.
# Omit or comment out to auto-detect (= number of CPU cores).
# concurrent_transformations = 4

# Abort a transformation, including its wait for a slot, after this many seconds.
# timeout_secs = 30

# ---------------------------------------------------------------------------
# Transformers
# ---------------------------------------------------------------------------
# When several transformers can handle an image, "preferred" beats "fallback";
# within the same tier the higher priority wins.

# In-process raster transformer (JPEG, PNG, GIF, TIFF, WebP).
[transformers.rust]
enabled = true
priority = 0

# ImageMagick subprocess transformer (all formats).
[transformers.imagemagick]
enabled = true
priority = 10

# Directory holding the binaries. Empty = search $PATH.
path = ""

# Ghostscript is installed, enabling EPS and PDF sources.
ghostscript = false

# Run GraphicsMagick (`gm convert`) instead of ImageMagick.
graphicsmagick = false

# JPEG/WebP quality when a request does not set one (1-100).
quality = 85
"##
}
