use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::ConfigurationError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub resize: ResizeConfig,
    #[serde(default)]
    pub media: MediaConfig,
}

/// Settings that decide whether a file is downsized and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResizeConfig {
    /// Force a 16:9 output (1280x720, 1920x1080, ...). When unset the width
    /// is left for ffmpeg to compute from the source aspect ratio.
    #[serde(default)]
    pub force_aspect_ratio: bool,
    /// Target vertical resolution
    #[serde(default)]
    pub resolution: TargetResolution,
}

/// The fixed set of vertical resolutions a file can be downsized to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "RawResolution", into = "String")]
pub enum TargetResolution {
    /// HD (1280x720)
    #[default]
    Hd720,
    /// Full HD (1920x1080)
    FullHd1080,
    /// Quad HD (2560x1440)
    QuadHd1440,
    /// Ultra HD (3840x2160)
    UltraHd2160,
}

impl TargetResolution {
    pub const ALL: [TargetResolution; 4] = [
        TargetResolution::Hd720,
        TargetResolution::FullHd1080,
        TargetResolution::QuadHd1440,
        TargetResolution::UltraHd2160,
    ];

    /// Height in pixels
    pub fn height(self) -> u32 {
        match self {
            TargetResolution::Hd720 => 720,
            TargetResolution::FullHd1080 => 1080,
            TargetResolution::QuadHd1440 => 1440,
            TargetResolution::UltraHd2160 => 2160,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TargetResolution::Hd720 => "HD (1280x720)",
            TargetResolution::FullHd1080 => "Full HD (1920x1080)",
            TargetResolution::QuadHd1440 => "Quad HD (2560x1440)",
            TargetResolution::UltraHd2160 => "Ultra HD (3840x2160)",
        }
    }
}

impl TryFrom<u32> for TargetResolution {
    type Error = ConfigurationError;

    fn try_from(height: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|r| r.height() == height)
            .ok_or_else(|| ConfigurationError::InvalidResolution(height.to_string()))
    }
}

impl TryFrom<&str> for TargetResolution {
    type Error = ConfigurationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let height: u32 = value
            .trim()
            .parse()
            .map_err(|_| ConfigurationError::InvalidResolution(value.to_string()))?;
        Self::try_from(height)
    }
}

impl TryFrom<String> for TargetResolution {
    type Error = ConfigurationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

/// A resolution as written in a config file: `"1080"` or `1080`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawResolution {
    Text(String),
    Height(u32),
}

impl TryFrom<RawResolution> for TargetResolution {
    type Error = ConfigurationError;

    fn try_from(raw: RawResolution) -> Result<Self, Self::Error> {
        match raw {
            RawResolution::Text(text) => Self::try_from(text.as_str()),
            RawResolution::Height(height) => Self::try_from(height),
        }
    }
}

impl From<TargetResolution> for String {
    fn from(resolution: TargetResolution) -> Self {
        resolution.height().to_string()
    }
}

impl fmt::Display for TargetResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.height())
    }
}

/// Which per-stream directives a global video filter suppresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuppressionScope {
    /// Only streams of the filtered type (video) lose their directives
    #[default]
    FilteredTypes,
    /// Every stream loses its directives, audio included
    AllStreams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
    /// Options placed before the input file
    pub main_options: Vec<String>,
    /// Pass `-y` so ffmpeg overwrites the output file
    pub overwrite: bool,
    /// Top-level mimetypes the probe accepts (e.g. "video", "audio")
    pub allowed_mimetypes: Vec<String>,
    pub suppression: SuppressionScope,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            main_options: vec![
                "-hide_banner".to_string(),
                "-loglevel".to_string(),
                "info".to_string(),
            ],
            overwrite: true,
            allowed_mimetypes: vec!["video".to_string()],
            suppression: SuppressionScope::FilteredTypes,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path).map_err(ConfigurationError::Read)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigurationError> {
        Ok(toml::from_str(content)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigurationError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(ConfigurationError::Write)?;
        Ok(())
    }
}
