use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::frame::ChannelOrder;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Synthetic moving gradient, no camera needed.
    Pattern,
    /// Multipart MJPEG stream over HTTP.
    Mjpeg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_fps")]
    pub fps: f64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_channel_order")]
    pub channel_order: ChannelOrder,
    /// Pattern source only: stop after this many frames.
    #[serde(default)]
    pub max_frames: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OverlayConfig {
    #[serde(default = "default_radius")]
    pub radius: u32,
    #[serde(default = "default_thickness")]
    pub thickness: u32,
    /// RGBA.
    #[serde(default = "default_color")]
    pub color: [u8; 4],
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLayout {
    /// Collection sub-directories with a pending state until finalized.
    Scoped,
    /// One flat directory, entries visible as soon as they are created.
    Legacy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub root: PathBuf,
    #[serde(default = "default_layout")]
    pub layout: StorageLayout,
    #[serde(default = "default_collection")]
    pub collection: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlConfig {
    #[serde(default = "default_control_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            url: None,
            fps: default_fps(),
            width: default_width(),
            height: default_height(),
            channel_order: default_channel_order(),
            max_frames: None,
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            thickness: default_thickness(),
            color: default_color(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            file_prefix: default_file_prefix(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            enabled: default_control_enabled(),
            bind: default_bind(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.source.kind == SourceKind::Mjpeg && self.source.url.is_none() {
            return Err(ConfigError::Invalid(
                "source.url is required when source.kind = \"mjpeg\"".into(),
            ));
        }
        if self.capture.file_prefix.is_empty()
            || self.capture.file_prefix.contains(['/', '\\'])
        {
            return Err(ConfigError::Invalid(format!(
                "capture.file_prefix {:?} must be a non-empty plain name",
                self.capture.file_prefix
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_source_kind() -> SourceKind {
    SourceKind::Pattern
}
fn default_fps() -> f64 {
    30.0
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_channel_order() -> ChannelOrder {
    ChannelOrder::Rgba
}
fn default_radius() -> u32 {
    100
}
fn default_thickness() -> u32 {
    5
}
fn default_color() -> [u8; 4] {
    [255, 0, 0, 255]
}
fn default_file_prefix() -> String {
    "snapcam".into()
}
fn default_layout() -> StorageLayout {
    StorageLayout::Scoped
}
fn default_collection() -> String {
    "Pictures/Snapcam".into()
}
fn default_control_enabled() -> bool {
    true
}
fn default_bind() -> String {
    "127.0.0.1:8088".into()
}
fn default_log_level() -> String {
    "info".into()
}
