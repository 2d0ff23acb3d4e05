use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::probe::{CodecType, ProbeResult, StreamInfo};

/// What the transcode does with one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamAction {
    Copy,
    Process,
    Discard,
}

/// Per-stream ffmpeg arguments, split the way ffmpeg expects them:
/// all `-map` arguments first, then all codec arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDirectives {
    pub mapping_args: Vec<String>,
    pub encoding_args: Vec<String>,
}

impl StreamDirectives {
    /// `-map 0:<t>:<n>` plus `-c:<t>:<n> copy`
    pub fn copy(codec_type: CodecType, stream_id: usize) -> Self {
        let specifier = codec_type.specifier();
        Self {
            mapping_args: vec!["-map".to_string(), format!("0:{}:{}", specifier, stream_id)],
            encoding_args: vec![format!("-c:{}:{}", specifier, stream_id), "copy".to_string()],
        }
    }
}

/// Outcome of a custom mapper for a stream that needs processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedStream {
    Process(StreamDirectives),
    Discard,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamVerdict {
    pub stream: StreamInfo,
    pub action: StreamAction,
    pub mapping_args: Vec<String>,
    pub encoding_args: Vec<String>,
}

impl StreamVerdict {
    fn new(stream: &StreamInfo, action: StreamAction, directives: StreamDirectives) -> Self {
        Self {
            stream: stream.clone(),
            action,
            mapping_args: directives.mapping_args,
            encoding_args: directives.encoding_args,
        }
    }

    pub fn codec_type(&self) -> CodecType {
        self.stream.codec_type
    }
}

/// Decide, stream by stream and in probe order, what happens to each stream.
///
/// Streams whose type is outside `type_filter` pass through untouched with no
/// directives. Streams inside it are tested with `needs_processing`: those
/// that pass are copied with explicit `-map`/`-c copy` directives, the rest are
/// handed to `custom_mapper` together with their ordinal among streams of the
/// same type (the `N` in `0:v:N`).
pub fn classify<P, M>(
    probe: &ProbeResult,
    type_filter: &[CodecType],
    needs_processing: P,
    custom_mapper: M,
) -> Vec<StreamVerdict>
where
    P: Fn(&StreamInfo) -> bool,
    M: Fn(&StreamInfo, usize) -> MappedStream,
{
    let mut type_counters: HashMap<CodecType, usize> = HashMap::new();

    probe
        .streams
        .iter()
        .map(|stream| {
            let counter = type_counters.entry(stream.codec_type).or_insert(0);
            let stream_id = *counter;
            *counter += 1;

            if !type_filter.contains(&stream.codec_type) {
                return StreamVerdict::new(stream, StreamAction::Copy, StreamDirectives::default());
            }

            if !needs_processing(stream) {
                debug!("Stream {} ({:?} #{}) will be copied", stream.index, stream.codec_type, stream_id);
                return StreamVerdict::new(
                    stream,
                    StreamAction::Copy,
                    StreamDirectives::copy(stream.codec_type, stream_id),
                );
            }

            match custom_mapper(stream, stream_id) {
                MappedStream::Process(directives) => {
                    debug!("Stream {} ({:?} #{}) needs processing", stream.index, stream.codec_type, stream_id);
                    StreamVerdict::new(stream, StreamAction::Process, directives)
                }
                MappedStream::Discard => {
                    debug!("Stream {} ({:?} #{}) will be discarded", stream.index, stream.codec_type, stream_id);
                    StreamVerdict::new(stream, StreamAction::Discard, StreamDirectives::default())
                }
            }
        })
        .collect()
}

/// Whether the file has to be queued at all.
pub fn any_verdict_is_process(verdicts: &[StreamVerdict]) -> bool {
    verdicts.iter().any(|v| v.action == StreamAction::Process)
}
