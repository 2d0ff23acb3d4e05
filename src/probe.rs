//! Media inspection through `ffprobe`.
//!
//! [`FfprobeProber`] shells out to
//! `ffprobe -v quiet -print_format json -show_format -show_streams <path>`
//! and maps the JSON into a [`ProbeResult`]. Stream fields that are missing or
//! malformed are left as `None` instead of failing the whole probe.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::error::ProbeError;

/// Elementary stream type as reported by ffprobe's `codec_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecType {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
}

impl CodecType {
    /// Unknown or missing codec types are treated as opaque data streams.
    pub fn from_ffprobe(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("video") => CodecType::Video,
            Some("audio") => CodecType::Audio,
            Some("subtitle") => CodecType::Subtitle,
            Some("attachment") => CodecType::Attachment,
            _ => CodecType::Data,
        }
    }

    /// ffmpeg stream specifier letter, as used in `-map 0:v:0`
    pub fn specifier(self) -> &'static str {
        match self {
            CodecType::Video => "v",
            CodecType::Audio => "a",
            CodecType::Subtitle => "s",
            CodecType::Data => "d",
            CodecType::Attachment => "t",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatInfo {
    pub format_name: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    /// Size in bytes
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Container stream index
    pub index: usize,
    pub codec_type: CodecType,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Remaining codec-specific fields, verbatim from ffprobe
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl StreamInfo {
    pub fn new(index: usize, codec_type: CodecType) -> Self {
        Self {
            index,
            codec_type,
            codec_name: None,
            width: None,
            height: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_codec<S: Into<String>>(mut self, codec_name: S) -> Self {
        self.codec_name = Some(codec_name.into());
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn is_video(&self) -> bool {
        self.codec_type == CodecType::Video
    }
}

/// Container and stream metadata of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub path: PathBuf,
    pub format: FormatInfo,
    pub streams: Vec<StreamInfo>,
}

impl ProbeResult {
    /// Parse the JSON printed by `ffprobe -print_format json -show_format -show_streams`.
    pub fn from_json<P: AsRef<Path>>(path: P, json: &str) -> Result<Self, ProbeError> {
        if json.trim().is_empty() {
            return Err(ProbeError::ParseFailure("ffprobe produced no output".to_string()));
        }

        let raw: FfprobeOutput = serde_json::from_str(json)
            .map_err(|e| ProbeError::ParseFailure(format!("ffprobe JSON parse error: {}", e)))?;

        let format = raw
            .format
            .map(|f| FormatInfo {
                format_name: f.get("format_name").and_then(as_string),
                duration: f.get("duration").and_then(as_f64),
                size: f.get("size").and_then(as_u64),
            })
            .unwrap_or_default();

        let streams = raw
            .streams
            .into_iter()
            .enumerate()
            .map(|(position, fields)| parse_stream(position, fields))
            .collect();

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            format,
            streams,
        })
    }

    pub fn duration(&self) -> Option<f64> {
        self.format.duration
    }

    pub fn streams_of(&self, codec_type: CodecType) -> impl Iterator<Item = &StreamInfo> {
        self.streams.iter().filter(move |s| s.codec_type == codec_type)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<Map<String, Value>>,
    #[serde(default)]
    streams: Vec<Map<String, Value>>,
}

fn parse_stream(position: usize, mut fields: Map<String, Value>) -> StreamInfo {
    let index = fields
        .remove("index")
        .as_ref()
        .and_then(as_u64)
        .map(|i| i as usize)
        .unwrap_or(position);
    let codec_type = CodecType::from_ffprobe(fields.remove("codec_type").as_ref().and_then(Value::as_str));
    let codec_name = fields.remove("codec_name").as_ref().and_then(as_string);
    let width = fields.remove("width").as_ref().and_then(as_u32);
    let height = fields.remove("height").as_ref().and_then(as_u32);

    StreamInfo {
        index,
        codec_type,
        codec_name,
        width,
        height,
        extra: fields.into_iter().collect(),
    }
}

// ffprobe prints most numbers in the format section as strings, so accept both.
fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    as_u64(value).and_then(|v| u32::try_from(v).ok())
}

fn as_f64(value: &Value) -> Option<f64> {
    let parsed: Option<f64> = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite() && *v >= 0.0)
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Guess a file's mimetype from its extension.
pub fn guess_mimetype(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mimetype = match ext.as_str() {
        "mkv" => "video/x-matroska",
        "mp4" | "m4v" => "video/mp4",
        "mov" | "qt" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "wmv" => "video/x-ms-wmv",
        "flv" => "video/x-flv",
        "mpg" | "mpeg" | "vob" => "video/mpeg",
        "ts" | "m2ts" | "mts" => "video/mp2t",
        "3gp" => "video/3gpp",
        "ogv" => "video/ogg",
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "wav" => "audio/x-wav",
        "srt" => "application/x-subrip",
        "ass" | "ssa" => "text/x-ssa",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => return None,
    };
    Some(mimetype)
}

const UNKNOWN_MIMETYPE: &str = "application/octet-stream";

/// Whether the top-level type of the file's mimetype (`video` in
/// `video/mp4`) is one of `allowed`.
pub fn is_allowed_mimetype(path: &Path, allowed: &[String]) -> bool {
    let mimetype = guess_mimetype(path).unwrap_or(UNKNOWN_MIMETYPE);
    let top_level = mimetype.split('/').next().unwrap_or_default();
    allowed.iter().any(|m| m.eq_ignore_ascii_case(top_level))
}

/// Seam between the planner and the inspection tool.
#[cfg_attr(test, mockall::automock)]
pub trait MediaProber {
    fn probe(&self, path: &Path) -> Result<ProbeResult, ProbeError>;
}

/// Prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: String,
    allowed_mimetypes: Vec<String>,
}

impl FfprobeProber {
    pub fn new<S: Into<String>>(ffprobe_path: S, allowed_mimetypes: Vec<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
            allowed_mimetypes,
        }
    }

    fn check_readable(path: &Path) -> Result<(), ProbeError> {
        if !path.is_file() {
            return Err(ProbeError::Unreadable(path.display().to_string()));
        }
        std::fs::File::open(path)
            .map(|_| ())
            .map_err(|e| ProbeError::Unreadable(format!("{}: {}", path.display(), e)))
    }

    fn check_mimetype(&self, path: &Path) -> Result<(), ProbeError> {
        if is_allowed_mimetype(path, &self.allowed_mimetypes) {
            Ok(())
        } else {
            Err(ProbeError::UnsupportedMimetype {
                path: path.display().to_string(),
                mimetype: guess_mimetype(path).unwrap_or(UNKNOWN_MIMETYPE).to_string(),
            })
        }
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> Result<ProbeResult, ProbeError> {
        Self::check_readable(path)?;
        self.check_mimetype(path)?;

        let binary = which::which(&self.ffprobe_path)
            .map_err(|e| ProbeError::ToolNotFound(format!("{}: {}", self.ffprobe_path, e)))?;

        debug!("Probing {} with {}", path.display(), binary.display());

        let output = Command::new(&binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| ProbeError::ToolNotFound(format!("Failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::ParseFailure(format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let result = ProbeResult::from_json(path, &stdout)?;
        debug!(
            "Probe found {} streams in {} (duration: {:?})",
            result.streams.len(),
            path.display(),
            result.duration()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_name": "h264", "codec_type": "video", "width": 1920, "height": 1080, "pix_fmt": "yuv420p"},
            {"index": 1, "codec_name": "aac", "codec_type": "audio", "channels": 2, "sample_rate": "48000"},
            {"index": 2, "codec_name": "subrip", "codec_type": "subtitle"}
        ],
        "format": {"format_name": "matroska,webm", "duration": "5400.250000", "size": "1073741824"}
    }"#;

    #[test]
    fn test_parse_sample() {
        let probe = ProbeResult::from_json("/media/movie.mkv", SAMPLE).unwrap();

        assert_eq!(probe.format.format_name.as_deref(), Some("matroska,webm"));
        assert_eq!(probe.duration(), Some(5400.25));
        assert_eq!(probe.format.size, Some(1_073_741_824));
        assert_eq!(probe.streams.len(), 3);

        let video = &probe.streams[0];
        assert_eq!(video.codec_type, CodecType::Video);
        assert_eq!(video.codec_name.as_deref(), Some("h264"));
        assert_eq!(video.height, Some(1080));
        assert_eq!(video.extra.get("pix_fmt"), Some(&Value::from("yuv420p")));

        assert_eq!(probe.streams[1].codec_type, CodecType::Audio);
        assert_eq!(probe.streams[1].height, None);
        assert_eq!(probe.streams[2].codec_type, CodecType::Subtitle);
        assert_eq!(probe.streams_of(CodecType::Audio).count(), 1);
    }

    #[test]
    fn test_malformed_stream_fields_are_omitted() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "height": "not-a-number", "width": -3},
                {"index": 4, "codec_type": "something_new"}
            ],
            "format": {"duration": "N/A"}
        }"#;
        let probe = ProbeResult::from_json("in.mkv", json).unwrap();

        assert_eq!(probe.streams[0].index, 0);
        assert_eq!(probe.streams[0].height, None);
        assert_eq!(probe.streams[0].width, None);
        assert_eq!(probe.streams[1].index, 4);
        assert_eq!(probe.streams[1].codec_type, CodecType::Data);
        assert_eq!(probe.duration(), None);
    }

    #[test]
    fn test_empty_and_invalid_output() {
        assert!(matches!(
            ProbeResult::from_json("in.mkv", "  "),
            Err(ProbeError::ParseFailure(_))
        ));
        assert!(matches!(
            ProbeResult::from_json("in.mkv", "{ not json"),
            Err(ProbeError::ParseFailure(_))
        ));

        let probe = ProbeResult::from_json("in.mkv", "{}").unwrap();
        assert!(probe.streams.is_empty());
        assert_eq!(probe.format, FormatInfo::default());
    }

    #[test]
    fn test_guess_mimetype() {
        assert_eq!(guess_mimetype(Path::new("a/b/movie.MKV")), Some("video/x-matroska"));
        assert_eq!(guess_mimetype(Path::new("song.flac")), Some("audio/flac"));
        assert_eq!(guess_mimetype(Path::new("README")), None);
    }

    #[test]
    fn test_is_allowed_mimetype() {
        let video_only = vec!["video".to_string()];
        assert!(is_allowed_mimetype(Path::new("movie.mp4"), &video_only));
        assert!(!is_allowed_mimetype(Path::new("song.mp3"), &video_only));
        assert!(!is_allowed_mimetype(Path::new("unknown.xyz"), &video_only));
        assert!(is_allowed_mimetype(Path::new("song.mp3"), &["Audio".to_string()]));
    }

    #[test]
    fn test_probe_rejects_missing_file() {
        let prober = FfprobeProber::new("ffprobe", vec!["video".to_string()]);
        let result = prober.probe(Path::new("/definitely/not/here.mkv"));
        assert!(matches!(result, Err(ProbeError::Unreadable(_))));
    }

    #[test]
    fn test_probe_rejects_disallowed_mimetype() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("notes.txt");
        file.write_str("hello").unwrap();

        let prober = FfprobeProber::new("ffprobe", vec!["video".to_string()]);
        let result = prober.probe(file.path());
        assert!(matches!(
            result,
            Err(ProbeError::UnsupportedMimetype { mimetype, .. }) if mimetype == "text/plain"
        ));
    }

    #[test]
    fn test_probe_reports_missing_tool() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("movie.mkv");
        file.write_binary(&[0u8; 16]).unwrap();

        let prober = FfprobeProber::new("ffprobe-that-does-not-exist", vec!["video".to_string()]);
        let result = prober.probe(file.path());
        assert!(matches!(result, Err(ProbeError::ToolNotFound(_))));
    }
}
