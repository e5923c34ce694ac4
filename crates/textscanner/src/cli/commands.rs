//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::preprocess::PreprocessMode;
use crate::region::{DisplaySize, Roi};

/// Preprocessing flags shared by the image commands.
#[derive(Debug, Clone, Args)]
pub struct PreprocessArgs {
    /// Preprocessing mode: grayscale, threshold, "adaptive threshold" or
    /// morphological (defaults to the configured mode)
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<PreprocessMode>,

    /// Binary threshold 0-255 (defaults to the configured threshold)
    #[arg(short, long)]
    pub threshold: Option<u8>,
}

/// Scan command arguments.
#[derive(Debug, Args)]
pub struct ScanCommand {
    /// Image to read
    pub image: PathBuf,

    #[command(flatten)]
    pub preprocess: PreprocessArgs,

    /// Only read this region, as x,y,width,height
    #[arg(short, long, value_name = "X,Y,W,H")]
    pub roi: Option<Roi>,

    /// The region was selected on a preview of this size (e.g. 640x480)
    #[arg(long, value_name = "WxH", requires = "roi")]
    pub roi_space: Option<DisplaySize>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Overlay command arguments.
#[derive(Debug, Args)]
pub struct OverlayCommand {
    /// Image to annotate
    pub image: PathBuf,

    /// Where to write the annotated image
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    #[command(flatten)]
    pub preprocess: PreprocessArgs,

    /// Output the detected boxes as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Preprocess command arguments.
#[derive(Debug, Args)]
pub struct PreprocessCommand {
    /// Image to filter
    pub image: PathBuf,

    /// Where to write the filtered image
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    #[command(flatten)]
    pub preprocess: PreprocessArgs,
}

/// Camera command arguments.
#[derive(Debug, Args)]
pub struct CameraCommand {
    /// Grab one frame, read it and optionally save it here
    #[arg(short, long, value_name = "FILE", conflicts_with = "watch")]
    pub snapshot: Option<PathBuf>,

    /// Keep reading frames and print text whenever it changes
    #[arg(short, long)]
    pub watch: bool,

    /// Milliseconds between reads in watch mode
    #[arg(long, default_value = "1000", value_name = "MS")]
    pub interval_ms: u64,

    /// Stop after reading this many frames in watch mode
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,

    /// Replay images from a directory instead of opening a camera
    #[arg(long, value_name = "DIR")]
    pub replay: Option<PathBuf>,

    /// Start the replay directory over when it runs out
    #[arg(long = "loop", requires = "replay")]
    pub looping: bool,

    /// Camera index (overrides the configured index)
    #[arg(short = 'd', long)]
    pub device: Option<u32>,

    #[command(flatten)]
    pub preprocess: PreprocessArgs,

    /// Output as JSON lines
    #[arg(short, long)]
    pub json: bool,
}

/// Shell command arguments.
#[derive(Debug, Args)]
pub struct ShellCommandArgs {
    /// Image to load on start
    #[arg(short, long, value_name = "FILE")]
    pub image: Option<PathBuf>,

    /// Use a directory of images as the camera
    #[arg(long, value_name = "DIR")]
    pub replay: Option<PathBuf>,

    /// Start the replay directory over when it runs out
    #[arg(long = "loop", requires = "replay")]
    pub looping: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to config file to validate (uses default if not specified)
        file: Option<PathBuf>,
    },
}
