use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, TargetResolution};
use crate::error::ConfigurationError;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Target vertical resolution (720, 1080, 1440 or 2160), overrides the config file
    #[arg(short, long)]
    pub resolution: Option<String>,

    /// Force a 16:9 output, overrides the config file
    #[arg(long, conflicts_with = "no_force_aspect_ratio")]
    pub force_aspect_ratio: bool,

    /// Keep the source aspect ratio, overrides the config file
    #[arg(long)]
    pub no_force_aspect_ratio: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Report whether a file has a video stream taller than the target
    Test {
        /// Input video file
        input: PathBuf,
    },

    /// Print the ffmpeg command that would resize a file
    Plan {
        /// Input video file
        input: PathBuf,

        /// Output file (defaults to the input file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the command and stream verdicts as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resize a file with ffmpeg, showing progress
    Run {
        /// Input video file
        input: PathBuf,

        /// Output file (defaults to replacing the input file)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the files in a directory that would be resized
    Scan {
        /// Directory to walk
        input_dir: PathBuf,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination of the configuration file
        #[arg(default_value = "config.toml")]
        output: PathBuf,
    },
}

impl Args {
    /// Apply the command line settings on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) -> Result<(), ConfigurationError> {
        if let Some(resolution) = &self.resolution {
            config.resize.resolution = TargetResolution::try_from(resolution.as_str())?;
        }
        if self.force_aspect_ratio {
            config.resize.force_aspect_ratio = true;
        } else if self.no_force_aspect_ratio {
            config.resize.force_aspect_ratio = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forced_config() -> Config {
        let mut config = Config::default();
        config.resize.force_aspect_ratio = true;
        config
    }

    #[test]
    fn test_overrides_leave_config_alone_by_default() {
        let args = Args::try_parse_from(["resize-video", "test", "in.mkv"]).unwrap();
        let mut config = forced_config();
        args.apply_overrides(&mut config).unwrap();

        assert!(config.resize.force_aspect_ratio);
        assert_eq!(config.resize.resolution, TargetResolution::Hd720);
    }

    #[test]
    fn test_no_force_aspect_ratio_turns_config_setting_off() {
        let args = Args::try_parse_from(["resize-video", "--no-force-aspect-ratio", "test", "in.mkv"]).unwrap();
        let mut config = forced_config();
        args.apply_overrides(&mut config).unwrap();

        assert!(!config.resize.force_aspect_ratio);
    }

    #[test]
    fn test_aspect_ratio_flags_conflict() {
        let result = Args::try_parse_from([
            "resize-video",
            "--force-aspect-ratio",
            "--no-force-aspect-ratio",
            "test",
            "in.mkv",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolution_override() {
        let args = Args::try_parse_from(["resize-video", "-r", "1440", "plan", "in.mkv"]).unwrap();
        let mut config = Config::default();
        args.apply_overrides(&mut config).unwrap();
        assert_eq!(config.resize.resolution, TargetResolution::QuadHd1440);

        let args = Args::try_parse_from(["resize-video", "-r", "480", "plan", "in.mkv"]).unwrap();
        assert!(matches!(
            args.apply_overrides(&mut config),
            Err(ConfigurationError::InvalidResolution(_))
        ));
    }
}
