//! resize-video - Downsize videos that exceed a target resolution
//!
//! Command line host for the resize planner: tests files, prints the planned
//! ffmpeg command, runs it with a progress bar, or scans a directory.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{info, warn, Level};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use walkdir::WalkDir;

use resize_video::cli::{Args, Commands};
use resize_video::config::Config;
use resize_video::media::MediaProcessorFactory;
use resize_video::probe::is_allowed_mimetype;
use resize_video::resize::ResizePlanner;

/// Resolution of the progress bar
const PROGRESS_STEPS: u64 = 1000;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    args.apply_overrides(&mut config)?;

    info!(
        "Target resolution: {} (force 16:9: {})",
        config.resize.resolution.label(),
        config.resize.force_aspect_ratio
    );

    let planner = ResizePlanner::from_config(&config);

    match args.command {
        Commands::Test { input } => {
            if planner.needs_queueing(&input) {
                println!("{}: needs resizing", input.display());
            } else {
                println!("{}: nothing to do", input.display());
            }
        }
        Commands::Plan { input, output, json } => {
            let output = output.unwrap_or_else(|| input.clone());
            match planner.plan(&input, &output)? {
                Some(plan) if json => {
                    let report = serde_json::json!({
                        "command": plan.command,
                        "verdicts": plan.verdicts,
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                Some(plan) => println!("{}", plan.command),
                None => println!("{}: nothing to do", input.display()),
            }
        }
        Commands::Run { input, output } => {
            let output = output.unwrap_or_else(|| input.clone());
            run(&config, &planner, &input, &output).await?;
        }
        Commands::Scan { input_dir } => {
            scan(&config, &planner, &input_dir);
        }
        Commands::InitConfig { output } => {
            Config::default().save_to_file(&output)?;
            println!("Wrote default configuration to {}", output.display());
        }
    }

    Ok(())
}

async fn run<P>(config: &Config, planner: &ResizePlanner<P>, input: &Path, output: &Path) -> Result<()>
where
    P: resize_video::probe::MediaProber,
{
    let Some(plan) = planner.plan(input, output)? else {
        println!("{}: nothing to do", input.display());
        return Ok(());
    };

    let processor = MediaProcessorFactory::create_processor(config.media.clone());
    processor.check_availability()?;
    info!("Using {}", processor.get_version_info().await?);

    let pb = ProgressBar::new(PROGRESS_STEPS);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% ({eta}) {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(plan.command.description.clone());

    let bar = pb.clone();
    let on_progress = move |event: resize_video::progress::ProgressEvent| {
        bar.set_position((event.fraction * PROGRESS_STEPS as f64) as u64);
    };

    if plan.progress.duration().is_none() {
        warn!("Duration of {} is unknown, progress cannot be shown", input.display());
    }

    match processor.run_transcode(&plan, &on_progress).await {
        Ok(()) => {
            pb.finish_with_message(format!("Resized {}", output.display()));
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message("Failed");
            Err(e.into())
        }
    }
}

fn scan<P>(config: &Config, planner: &ResizePlanner<P>, input_dir: &Path)
where
    P: resize_video::probe::MediaProber,
{
    info!("Scanning directory: {}", input_dir.display());

    let mut matched = 0usize;
    for entry in WalkDir::new(input_dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_allowed_mimetype(path, &config.media.allowed_mimetypes) {
            continue;
        }
        if planner.needs_queueing(path) {
            println!("{}", path.display());
            matched += 1;
        }
    }

    info!("{} file(s) need resizing to {}p", matched, config.resize.resolution);
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".resize-video").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "resize-video.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Logging initialized - console: {}, file: {}",
          log_level, log_dir.join("resize-video.log").display());

    Ok(())
}
