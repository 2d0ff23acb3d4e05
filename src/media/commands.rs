use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{MediaConfig, SuppressionScope};
use crate::error::BuildError;
use crate::probe::CodecType;
use super::mapper::StreamVerdict;

/// Abstract media processing command representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add video filter
    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Recover input, output and video filter from the argument list
    pub fn parse(&self) -> Option<ParsedCommand> {
        ParsedCommand::parse(&self.args)
    }
}

impl fmt::Display for MediaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote_arg(&self.binary_path))?;
        for arg in &self.args {
            write!(f, " {}", quote_arg(arg))?;
        }
        Ok(())
    }
}

fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains(|c: char| c.is_whitespace() || c == '"' || c == '\'') {
        arg.to_string()
    } else {
        format!("\"{}\"", arg.replace('"', "\\\""))
    }
}

/// The parts of a transcode command a host needs to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub input: PathBuf,
    pub output: PathBuf,
    pub video_filter: Option<String>,
}

impl ParsedCommand {
    /// Options whose value is the following argument.
    const VALUE_OPTIONS: &'static [&'static str] = &["-i", "-vf", "-map", "-loglevel", "-f"];

    pub fn parse(args: &[String]) -> Option<Self> {
        let mut input = None;
        let mut video_filter = None;
        let mut iter = args.iter();
        let mut last_positional = None;

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-i" => input = iter.next().cloned(),
                "-vf" => video_filter = iter.next().cloned(),
                a if a.starts_with("-c:") || Self::VALUE_OPTIONS.contains(&a) => {
                    iter.next();
                }
                a if a.starts_with('-') && a.len() > 1 => {}
                _ => last_positional = Some(arg.clone()),
            }
        }

        Some(Self {
            input: PathBuf::from(input?),
            output: PathBuf::from(last_positional?),
            video_filter,
        })
    }
}

/// Builds the ffmpeg invocation for a set of stream verdicts.
#[derive(Debug, Clone)]
pub struct TranscodeCommandBuilder {
    binary_path: String,
    main_options: Vec<String>,
    output_options: Vec<String>,
    suppression: SuppressionScope,
    filter_scope: Vec<CodecType>,
}

impl TranscodeCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
            main_options: Vec::new(),
            output_options: Vec::new(),
            suppression: SuppressionScope::default(),
            filter_scope: vec![CodecType::Video],
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(&config.ffmpeg_path)
            .main_options(config.main_options.clone())
            .overwrite(config.overwrite)
            .suppression(config.suppression)
    }

    /// Options placed before `-i`
    pub fn main_options(mut self, options: Vec<String>) -> Self {
        self.main_options = options;
        self
    }

    /// Force overwrite output
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.output_options.retain(|o| o != "-y");
        if overwrite {
            self.output_options.push("-y".to_string());
        }
        self
    }

    pub fn suppression(mut self, suppression: SuppressionScope) -> Self {
        self.suppression = suppression;
        self
    }

    fn suppressed(&self, verdict: &StreamVerdict, global_filter: Option<&str>) -> bool {
        global_filter.is_some()
            && match self.suppression {
                SuppressionScope::FilteredTypes => self.filter_scope.contains(&verdict.codec_type()),
                SuppressionScope::AllStreams => true,
            }
    }

    /// Assemble `ffmpeg [main options] -i <input> [maps] [codecs] [-vf <filter>] [-y] <output>`.
    ///
    /// When a global video filter is given, the per-stream directives of the
    /// streams it applies to are dropped; the filter alone governs them.
    pub fn build<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: Q,
        verdicts: &[StreamVerdict],
        global_filter: Option<&str>,
    ) -> Result<MediaCommand, BuildError> {
        let input_path = input_path.as_ref();
        if input_path.as_os_str().is_empty() {
            return Err(BuildError::EmptyInputPath);
        }
        if verdicts.is_empty() {
            return Err(BuildError::NoStreams);
        }

        let (kept, suppressed): (Vec<&StreamVerdict>, Vec<&StreamVerdict>) =
            verdicts.iter().partition(|v| !self.suppressed(v, global_filter));

        // Any explicit -map disables ffmpeg's default stream selection, so the
        // filtered streams have to be mapped back in by type.
        let mut type_maps = Vec::new();
        if kept.iter().any(|v| !v.mapping_args.is_empty()) {
            for codec_type in &self.filter_scope {
                if suppressed.iter().any(|v| v.codec_type() == *codec_type) {
                    type_maps.push("-map".to_string());
                    type_maps.push(format!("0:{}", codec_type.specifier()));
                }
            }
        }

        let mut cmd = MediaCommand::new(&self.binary_path, "Resize video")
            .args(self.main_options.iter().cloned())
            .input(input_path)
            .args(type_maps)
            .args(kept.iter().flat_map(|v| v.mapping_args.iter().cloned()))
            .args(kept.iter().flat_map(|v| v.encoding_args.iter().cloned()));

        if let Some(filter) = global_filter {
            cmd = cmd.video_filter(filter);
        }

        Ok(cmd.args(self.output_options.iter().cloned()).output(output_path))
    }
}
