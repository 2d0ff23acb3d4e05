//! The two questions a host pipeline asks about a file: should it be queued,
//! and if so, what command transcodes it.

use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{Config, MediaConfig};
use crate::error::Result;
use crate::media::{
    any_verdict_is_process, classify, MappedStream, MediaCommand, StreamDirectives, StreamVerdict,
    TranscodeCommandBuilder,
};
use crate::policy::ResolutionPolicy;
use crate::probe::{CodecType, FfprobeProber, MediaProber, ProbeResult};
use crate::progress::ProgressParser;

/// Stream types the resize decision looks at
const PROCESSED_TYPES: &[CodecType] = &[CodecType::Video];

/// Everything a host needs to run one transcode.
#[derive(Debug, Clone)]
pub struct TranscodePlan {
    pub command: MediaCommand,
    pub progress: ProgressParser,
    pub verdicts: Vec<StreamVerdict>,
}

pub struct ResizePlanner<P: MediaProber> {
    prober: P,
    policy: ResolutionPolicy,
    command_builder: TranscodeCommandBuilder,
}

impl ResizePlanner<FfprobeProber> {
    pub fn from_config(config: &Config) -> Self {
        let prober = FfprobeProber::new(&config.media.ffprobe_path, config.media.allowed_mimetypes.clone());
        Self::new(prober, ResolutionPolicy::from(config.resize), &config.media)
    }
}

impl<P: MediaProber> ResizePlanner<P> {
    pub fn new(prober: P, policy: ResolutionPolicy, media: &MediaConfig) -> Self {
        Self {
            prober,
            policy,
            command_builder: TranscodeCommandBuilder::from_config(media),
        }
    }

    pub fn policy(&self) -> &ResolutionPolicy {
        &self.policy
    }

    /// Classify every stream of a probed file against the resolution policy.
    ///
    /// Tall video streams get no directives of their own: the global scale
    /// filter handles them.
    pub fn verdicts(&self, probe: &ProbeResult) -> Vec<StreamVerdict> {
        classify(
            probe,
            PROCESSED_TYPES,
            |stream| self.policy.needs_processing(stream),
            |_, _| MappedStream::Process(StreamDirectives::default()),
        )
    }

    /// Whether the file has a video stream taller than the target. Files that
    /// cannot be probed are skipped rather than reported as errors.
    pub fn needs_queueing<F: AsRef<Path>>(&self, path: F) -> bool {
        let path = path.as_ref();
        let probe = match self.prober.probe(path) {
            Ok(probe) => probe,
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                return false;
            }
        };

        let needs_processing = any_verdict_is_process(&self.verdicts(&probe));
        if needs_processing {
            debug!("File '{}' should be added to task list. Probe found streams require processing.", path.display());
        } else {
            debug!("File '{}' does not contain streams require processing.", path.display());
        }
        needs_processing
    }

    /// Build the transcode for `file_in`, or `None` when nothing needs resizing.
    pub fn plan<A: AsRef<Path>, B: AsRef<Path>>(&self, file_in: A, file_out: B) -> Result<Option<TranscodePlan>> {
        let file_in = file_in.as_ref();
        let probe = self.prober.probe(file_in)?;
        self.plan_for_probe(&probe, file_out)
    }

    /// Same as [`plan`](Self::plan) for an already probed file.
    pub fn plan_for_probe<B: AsRef<Path>>(&self, probe: &ProbeResult, file_out: B) -> Result<Option<TranscodePlan>> {
        let verdicts = self.verdicts(probe);
        if !any_verdict_is_process(&verdicts) {
            debug!("No stream of {} needs resizing", probe.path.display());
            return Ok(None);
        }

        let filter = self.policy.video_filter();
        let mut command = self
            .command_builder
            .build(&probe.path, file_out, &verdicts, Some(filter.as_str()))?;
        command.description = format!("Resize to {}p", self.policy.target_height());

        info!("Planned transcode for {}: {}", probe.path.display(), command);

        Ok(Some(TranscodePlan {
            command,
            progress: ProgressParser::from_probe(probe),
            verdicts,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SuppressionScope, TargetResolution};
    use crate::error::{ProbeError, ResizeError};
    use crate::probe::{FormatInfo, MockMediaProber, StreamInfo};
    use std::path::PathBuf;

    fn probe_of(path: &str, streams: Vec<StreamInfo>) -> ProbeResult {
        ProbeResult {
            path: PathBuf::from(path),
            format: FormatInfo {
                format_name: Some("matroska,webm".to_string()),
                duration: Some(120.0),
                size: Some(1024),
            },
            streams,
        }
    }

    fn planner_with(streams: Vec<StreamInfo>, target: TargetResolution) -> ResizePlanner<MockMediaProber> {
        let mut prober = MockMediaProber::new();
        prober
            .expect_probe()
            .returning(move |path| Ok(probe_of(&path.to_string_lossy(), streams.clone())));

        let media = MediaConfig {
            main_options: vec![],
            overwrite: false,
            ..MediaConfig::default()
        };
        ResizePlanner::new(prober, ResolutionPolicy::new(target, false), &media)
    }

    #[test]
    fn test_tall_video_is_planned_with_scale_filter() {
        let planner = planner_with(
            vec![
                StreamInfo::new(0, CodecType::Video).with_codec("h264").with_dimensions(1920, 1080),
                StreamInfo::new(1, CodecType::Audio).with_codec("aac"),
            ],
            TargetResolution::Hd720,
        );

        assert!(planner.needs_queueing("/media/in.mkv"));

        let plan = planner.plan("/media/in.mkv", "/cache/out.mkv").unwrap().unwrap();
        let args = &plan.command.args;

        assert_eq!(plan.command.binary_path, "ffmpeg");
        assert_eq!(args, &vec!["-i", "/media/in.mkv", "-vf", "scale=-1:720", "/cache/out.mkv"]);
        assert!(!args.iter().any(|a| a == "-map" || a.starts_with("-c:v")));
        assert_eq!(plan.progress.duration(), Some(120.0));
        assert_eq!(plan.command.description, "Resize to 720p");
    }

    #[test]
    fn test_second_small_video_stream_is_covered_by_filter() {
        let planner = planner_with(
            vec![
                StreamInfo::new(0, CodecType::Video).with_dimensions(3840, 2160),
                StreamInfo::new(1, CodecType::Video).with_codec("mjpeg").with_dimensions(320, 240),
            ],
            TargetResolution::FullHd1080,
        );

        let plan = planner.plan("/in.mp4", "/in.mp4").unwrap().unwrap();
        assert_eq!(plan.command.args, vec!["-i", "/in.mp4", "-vf", "scale=-1:1080", "/in.mp4"]);
        assert_eq!(plan.verdicts[1].mapping_args, vec!["-map", "0:v:1"]);
    }

    #[test]
    fn test_small_video_is_not_queued() {
        let planner = planner_with(
            vec![StreamInfo::new(0, CodecType::Video).with_dimensions(640, 480)],
            TargetResolution::Hd720,
        );

        assert!(!planner.needs_queueing("/media/small.mkv"));
        assert!(planner.plan("/media/small.mkv", "/out.mkv").unwrap().is_none());
    }

    #[test]
    fn test_video_at_target_height_is_not_queued() {
        let planner = planner_with(
            vec![StreamInfo::new(0, CodecType::Video).with_dimensions(1280, 720)],
            TargetResolution::Hd720,
        );
        assert!(!planner.needs_queueing("/media/exact.mkv"));
    }

    #[test]
    fn test_empty_probe_is_not_queued() {
        let planner = planner_with(vec![], TargetResolution::Hd720);
        assert!(!planner.needs_queueing("/media/empty.mkv"));
        assert!(planner.plan("/media/empty.mkv", "/out.mkv").unwrap().is_none());
    }

    #[test]
    fn test_probe_failure() {
        let mut prober = MockMediaProber::new();
        prober
            .expect_probe()
            .returning(|_| Err(ProbeError::ToolNotFound("ffprobe".to_string())));
        let planner = ResizePlanner::new(
            prober,
            ResolutionPolicy::new(TargetResolution::Hd720, false),
            &MediaConfig::default(),
        );

        assert!(!planner.needs_queueing("/media/in.mkv"));
        assert!(matches!(
            planner.plan("/media/in.mkv", "/out.mkv"),
            Err(ResizeError::Probe(ProbeError::ToolNotFound(_)))
        ));
    }

    #[test]
    fn test_blanket_suppression_from_config() {
        let mut prober = MockMediaProber::new();
        prober.expect_probe().returning(|path| {
            Ok(probe_of(
                &path.to_string_lossy(),
                vec![StreamInfo::new(0, CodecType::Video).with_dimensions(1920, 1080)],
            ))
        });
        let media = MediaConfig {
            suppression: SuppressionScope::AllStreams,
            ..MediaConfig::default()
        };
        let planner = ResizePlanner::new(prober, ResolutionPolicy::new(TargetResolution::Hd720, true), &media);

        let plan = planner.plan("/in.mkv", "/out.mkv").unwrap().unwrap();
        assert_eq!(
            plan.command.args,
            vec!["-hide_banner", "-loglevel", "info", "-i", "/in.mkv", "-vf", "scale=1280:720", "-y", "/out.mkv"]
        );
    }
}
