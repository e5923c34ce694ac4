//! Command-line interface for textscanner.
//!
//! This module provides the CLI structure for the `txtscan` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CameraCommand, ConfigCommand, OverlayCommand, PreprocessArgs, PreprocessCommand, ScanCommand,
    ShellCommandArgs, StatusCommand,
};

use crate::config::Config;
use crate::logging::Verbosity;
use crate::scanner::ScanParams;

/// txtscan - Read text from images and live camera frames
///
/// Preprocesses an image or camera frame and extracts its text with the
/// tesseract OCR engine.
#[derive(Debug, Parser)]
#[command(name = "txtscan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract text from an image file
    Scan(ScanCommand),

    /// Outline detected words and save the result
    Overlay(OverlayCommand),

    /// Save the preprocessed image without running OCR
    Preprocess(PreprocessCommand),

    /// Read text from the live camera
    Camera(CameraCommand),

    /// Interactive session with image, region and camera controls
    Shell(ShellCommandArgs),

    /// Show OCR engine and camera availability
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}

impl PreprocessArgs {
    /// Resolve the flags against the configured defaults.
    #[must_use]
    pub fn params(&self, config: &Config) -> ScanParams {
        let defaults = ScanParams::from_config(config);
        ScanParams {
            mode: self.mode.unwrap_or(defaults.mode),
            threshold: self.threshold.unwrap_or(defaults.threshold),
        }
    }
}
