use tracing::debug;

use crate::config::{ResizeConfig, TargetResolution};
use crate::probe::StreamInfo;

/// Decides which video streams are too tall and how to scale them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolutionPolicy {
    target: TargetResolution,
    force_aspect_ratio: bool,
}

impl ResolutionPolicy {
    pub fn new(target: TargetResolution, force_aspect_ratio: bool) -> Self {
        Self {
            target,
            force_aspect_ratio,
        }
    }

    pub fn target_height(&self) -> u32 {
        self.target.height()
    }

    /// True only for video streams strictly taller than the target. Streams
    /// without a known height are never processed.
    pub fn needs_processing(&self, stream: &StreamInfo) -> bool {
        if !stream.is_video() {
            return false;
        }

        let desired_height = self.target_height();
        match stream.height {
            Some(height) => {
                debug!("Stream {} height: {} Desired height: {}", stream.index, height, desired_height);
                height > desired_height
            }
            None => {
                debug!("Stream {} has no height, leaving it untouched", stream.index);
                false
            }
        }
    }

    /// The `W:H` argument for ffmpeg's scale filter.
    pub fn scale_filter(&self) -> String {
        let desired_height = self.target_height();
        if self.force_aspect_ratio {
            format!("{}:{}", desired_height * 16 / 9, desired_height)
        } else {
            format!("-1:{}", desired_height)
        }
    }

    /// Full `-vf` value, e.g. `scale=-1:720`
    pub fn video_filter(&self) -> String {
        format!("scale={}", self.scale_filter())
    }
}

impl From<ResizeConfig> for ResolutionPolicy {
    fn from(config: ResizeConfig) -> Self {
        Self::new(config.resolution, config.force_aspect_ratio)
    }
}
