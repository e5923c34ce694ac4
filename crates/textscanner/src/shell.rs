//! Line commands for the interactive session.
//!
//! Each line typed at the `txtscan shell` prompt parses into a
//! [`ShellCommand`]. [`execute`] applies it to a [`Session`]; camera
//! start/stop is handed back to the caller, which owns the frame pump.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::preprocess::PreprocessMode;
use crate::region::{DisplayRect, DisplaySize, Roi};
use crate::session::Session;

/// Help text listing the shell commands.
pub const HELP: &str = "\
Commands:
  load <FILE>              load an image
  camera on|off            start or stop the live camera
  ocr                      recognize text in the whole image
  ocr roi                  recognize text in the selected region
  overlay                  outline detected words
  roi <x,y,w,h>            select a region in image pixels
  roi clear                clear the selected region
  drag <x,y> <x,y> <WxH>   select a region dragged on a WxH preview
  mode <NAME>              grayscale | threshold | adaptive threshold | morphological
  threshold <0-255>        binary threshold value
  preview <FILE>           save the preprocessed image
  save <FILE>              save the image on screen
  status                   show the session state
  help                     show this help
  quit                     leave the shell";

/// One shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    /// Load an image file.
    Load(PathBuf),
    /// Start the camera.
    CameraOn,
    /// Stop the camera.
    CameraOff,
    /// OCR the whole image.
    Ocr,
    /// OCR the selected region.
    OcrRoi,
    /// Draw word boxes.
    Overlay,
    /// Select a region in image coordinates.
    Roi(Roi),
    /// Select a region dragged on a preview.
    Drag {
        /// The dragged rectangle.
        rect: DisplayRect,
        /// Size of the preview it was dragged on.
        display: DisplaySize,
    },
    /// Clear the region.
    ClearRoi,
    /// Change the preprocessing mode.
    Mode(PreprocessMode),
    /// Change the threshold (clamped on apply).
    Threshold(i64),
    /// Save the preprocessed preview.
    Preview(PathBuf),
    /// Save the on-screen image.
    Save(PathBuf),
    /// Print session state.
    Status,
    /// Print help.
    Help,
    /// Leave the shell.
    Quit,
}

/// What the caller should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellAction {
    /// Print this and read the next line.
    Print(String),
    /// Start the frame pump.
    StartCamera,
    /// Stop the frame pump.
    StopCamera,
    /// Exit the shell.
    Quit,
}

fn parse_point(s: &str) -> Result<(u32, u32)> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| Error::invalid_roi(format!("expected x,y but got '{s}'")))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|_| Error::invalid_roi(format!("'{v}' is not a whole number")))
    };
    Ok((parse(x)?, parse(y)?))
}

fn usage(message: &str) -> Error {
    Error::config_validation(format!("{message} (type 'help' for commands)"))
}

impl FromStr for ShellCommand {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(usage("empty command"));
        };
        let rest: Vec<&str> = words.collect();

        let command = match (verb.to_ascii_lowercase().as_str(), rest.as_slice()) {
            ("load" | "open", [_, ..]) => Self::Load(PathBuf::from(rest.join(" "))),
            ("camera", ["on" | "start"]) => Self::CameraOn,
            ("camera", ["off" | "stop"]) => Self::CameraOff,
            ("ocr", []) => Self::Ocr,
            ("ocr", ["roi"]) => Self::OcrRoi,
            ("overlay" | "boxes", []) => Self::Overlay,
            ("roi", ["clear"]) => Self::ClearRoi,
            ("roi", [region]) => Self::Roi(region.parse()?),
            ("drag", [start, end, display]) => Self::Drag {
                rect: DisplayRect::from_corners(parse_point(start)?, parse_point(end)?),
                display: display.parse()?,
            },
            ("mode", [_, ..]) => Self::Mode(rest.join(" ").parse()?),
            ("threshold", [value]) => Self::Threshold(
                value
                    .parse()
                    .map_err(|_| usage(&format!("threshold '{value}' is not a number")))?,
            ),
            ("preview", [_, ..]) => Self::Preview(PathBuf::from(rest.join(" "))),
            ("save", [_, ..]) => Self::Save(PathBuf::from(rest.join(" "))),
            ("status", []) => Self::Status,
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit" | "q", []) => Self::Quit,
            _ => return Err(usage(&format!("unrecognized command '{}'", line.trim()))),
        };
        Ok(command)
    }
}

/// Apply `command` to `session`.
///
/// # Errors
///
/// Returns an error only when a save fails; handler outcomes are reported
/// through the session status.
pub fn execute(session: &mut Session, command: ShellCommand) -> Result<ShellAction> {
    let reply = match command {
        ShellCommand::CameraOn => return Ok(ShellAction::StartCamera),
        ShellCommand::CameraOff => return Ok(ShellAction::StopCamera),
        ShellCommand::Quit => return Ok(ShellAction::Quit),
        ShellCommand::Help => HELP.to_string(),
        ShellCommand::Status => describe(session),
        ShellCommand::Load(path) => {
            session.load_image(&path);
            status_line(session)
        }
        ShellCommand::Ocr => {
            session.ocr_full_image();
            text_and_status(session)
        }
        ShellCommand::OcrRoi => {
            session.ocr_roi();
            if session.status().starts_with("OCR complete") {
                text_and_status(session)
            } else {
                status_line(session)
            }
        }
        ShellCommand::Overlay => {
            session.show_overlay();
            let mut out = String::new();
            for b in session.boxes() {
                let _ = writeln!(
                    out,
                    "{:>5},{:<5} {:>4}x{:<4} {:>5.1}%  {}",
                    b.x, b.y, b.width, b.height, b.confidence, b.text
                );
            }
            out.push_str(&status_line(session));
            out
        }
        ShellCommand::Roi(roi) => {
            session.select_roi(roi);
            status_line(session)
        }
        ShellCommand::Drag { rect, display } => {
            session.select_display_roi(rect, display);
            status_line(session)
        }
        ShellCommand::ClearRoi => {
            session.clear_roi();
            status_line(session)
        }
        ShellCommand::Mode(mode) => {
            session.set_mode(mode);
            format!("Mode: {mode}")
        }
        ShellCommand::Threshold(value) => {
            session.set_threshold(value);
            format!("Threshold: {}", session.params().threshold)
        }
        ShellCommand::Preview(path) => {
            session.save_preview(&path)?;
            format!("Preview saved to {}", path.display())
        }
        ShellCommand::Save(path) => {
            session.save_display(&path)?;
            format!("Image saved to {}", path.display())
        }
    };
    Ok(ShellAction::Print(reply))
}

fn status_line(session: &Session) -> String {
    format!("[{}]", session.status())
}

fn text_and_status(session: &Session) -> String {
    format!("{}\n{}", session.text(), status_line(session))
}

fn describe(session: &Session) -> String {
    let image = session.current_image().map_or_else(
        || "none".to_string(),
        |img| format!("{}x{}", img.width(), img.height()),
    );
    let roi = session
        .roi()
        .map_or_else(|| "none".to_string(), |r| r.to_string());
    let params = session.params();
    format!(
        "Image:     {image}\nRegion:    {roi}\nMode:      {}\nThreshold: {}\nCamera:    {}\n{}",
        params.mode,
        params.threshold,
        if session.camera_active() { "on" } else { "off" },
        status_line(session)
    )
}
