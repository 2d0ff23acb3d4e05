//! resize-video - Downsize videos that exceed a target resolution
//!
//! Probes a file with ffprobe, decides per stream what has to happen, and
//! builds the ffmpeg command that scales oversized video down to 720p, 1080p,
//! 1440p or 2160p while leaving the other streams alone.

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod policy;
pub mod probe;
pub mod progress;
pub mod resize;
