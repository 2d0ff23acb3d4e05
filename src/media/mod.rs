// Stream mapping and transcode command handling
//
// - Mapper: per-stream verdicts (copy / process / discard)
// - Commands: ffmpeg command representation and builder
// - Processor: runs a planned command and reports progress

pub mod commands;
pub mod mapper;
pub mod processor;

use async_trait::async_trait;

pub use commands::*;
pub use mapper::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::progress::ProgressEvent;
use crate::resize::TranscodePlan;

/// Main trait for executing planned transcodes
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Run the plan's command, calling `on_progress` for every progress event.
    /// An output path equal to the input path is replaced only on success.
    async fn run_transcode(
        &self,
        plan: &TranscodePlan,
        on_progress: &(dyn Fn(ProgressEvent) + Send + Sync),
    ) -> Result<()>;

    /// Check if the transcoder is available
    fn check_availability(&self) -> Result<()>;

    /// Get transcoder version information
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
