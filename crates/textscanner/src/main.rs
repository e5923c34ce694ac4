//! `txtscan` - CLI for textscanner
//!
//! This binary reads text from image files and camera frames, and hosts the
//! interactive scanning shell.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Write as _;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use textscanner::camera::{
    ffmpeg_available, CameraDevice, FfmpegCamera, Frame, FramePump, FrameSource, ImageSequence,
    PumpEvent, PumpHandle, PumpStats,
};
use textscanner::cli::{
    CameraCommand, Cli, Command, ConfigCommand, OverlayCommand, PreprocessCommand, ScanCommand,
    ShellCommandArgs,
};
use textscanner::region::DisplayRect;
use textscanner::scanner::save_image;
use textscanner::shell::{self, ShellAction, ShellCommand};
use textscanner::{
    init_logging, Config, OcrOutcome, Roi, ScanParams, Scanner, Session, TesseractEngine,
};

// Platform-specific imports using conditional compilation
#[cfg(target_os = "linux")]
use textscanner_linux as platform;

#[cfg(target_os = "macos")]
use textscanner_mac as platform;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Scan(cmd) => handle_scan(&config, &cmd),
        Command::Overlay(cmd) => handle_overlay(&config, &cmd),
        Command::Preprocess(cmd) => handle_preprocess(&config, &cmd),
        Command::Camera(cmd) => runtime()?.block_on(handle_camera(&config, &cmd)),
        Command::Shell(cmd) => runtime()?.block_on(handle_shell(&config, &cmd)),
        Command::Status(cmd) => runtime()?.block_on(handle_status(&config, cmd.json)),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn init_platform() -> anyhow::Result<()> {
    platform::init().map_err(|e| anyhow::anyhow!("platform initialization failed: {e}"))
}

/// Reject inputs whose extension is not a configured image format.
fn check_format(config: &Config, path: &Path) -> textscanner::Result<()> {
    if config.is_supported_image(path) {
        Ok(())
    } else {
        Err(textscanner::Error::UnsupportedFormat {
            path: path.to_path_buf(),
        })
    }
}

fn handle_scan(config: &Config, cmd: &ScanCommand) -> anyhow::Result<()> {
    check_format(config, &cmd.image)?;
    let scanner = Scanner::from_config(config);
    let image = scanner.load_image(&cmd.image)?;
    let params = cmd.preprocess.params(config);

    let outcome = match cmd.roi {
        Some(roi) => {
            let roi = match cmd.roi_space {
                Some(space) => {
                    let rect = DisplayRect {
                        x: roi.x,
                        y: roi.y,
                        width: roi.width,
                        height: roi.height,
                    };
                    Roi::from_display(rect, space, image.width(), image.height())
                        .context("preview size must be non-zero")?
                }
                None => roi,
            };
            scanner.scan_roi(&image, roi, params)?
        }
        None => scanner.scan(&image, params)?,
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.is_empty() {
        println!(
            "{}",
            if outcome.roi.is_some() {
                "No text detected in ROI"
            } else {
                "No text detected"
            }
        );
    } else {
        println!("{}", outcome.text);
    }
    Ok(())
}

fn handle_overlay(config: &Config, cmd: &OverlayCommand) -> anyhow::Result<()> {
    check_format(config, &cmd.image)?;
    let scanner = Scanner::from_config(config);
    let image = scanner.load_image(&cmd.image)?;
    let outcome = scanner.overlay(&image, cmd.preprocess.params(config))?;
    save_image(&outcome.image, &cmd.output)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&outcome.boxes)?);
    } else {
        for b in &outcome.boxes {
            println!(
                "{:>5},{:<5} {:>4}x{:<4} {:>5.1}%  {}",
                b.x, b.y, b.width, b.height, b.confidence, b.text
            );
        }
        println!(
            "Overlay complete - {} text regions detected",
            outcome.boxes.len()
        );
        println!("Saved to {}", cmd.output.display());
    }
    Ok(())
}

fn handle_preprocess(config: &Config, cmd: &PreprocessCommand) -> anyhow::Result<()> {
    check_format(config, &cmd.image)?;
    let scanner = Scanner::from_config(config);
    let image = scanner.load_image(&cmd.image)?;
    let params = cmd.preprocess.params(config);
    let processed = scanner.preprocess(&image, params);
    save_image(&processed, &cmd.output)?;

    if params.mode.uses_threshold() {
        println!(
            "{} ({}, threshold {}) saved to {}",
            cmd.image.display(),
            params.mode,
            params.threshold,
            cmd.output.display()
        );
    } else {
        println!(
            "{} ({}) saved to {}",
            cmd.image.display(),
            params.mode,
            cmd.output.display()
        );
    }
    Ok(())
}

fn frame_source(
    config: &Config,
    replay: Option<&Path>,
    looping: bool,
    device: Option<u32>,
) -> Box<dyn FrameSource> {
    match replay {
        Some(dir) => Box::new(
            ImageSequence::new(
                dir,
                &config.files.supported_image_formats,
                config.files.max_image_dimension,
            )
            .looping(looping),
        ),
        None => {
            let index = device.unwrap_or(config.camera.camera_index);
            Box::new(FfmpegCamera::new(CameraDevice::from_config(
                &config.camera,
                platform::capture_format(),
                platform::device_name(index),
            )))
        }
    }
}

async fn scan_frame(
    scanner: &Scanner,
    frame: Frame,
    params: ScanParams,
) -> anyhow::Result<(Frame, OcrOutcome)> {
    let scanner = scanner.clone();
    let (frame, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = scanner.scan(&frame.image, params);
        (frame, outcome)
    })
    .await?;
    Ok((frame, outcome?))
}

async fn handle_camera(config: &Config, cmd: &CameraCommand) -> anyhow::Result<()> {
    init_platform()?;
    let scanner = Scanner::from_config(config);
    let params = cmd.preprocess.params(config);
    let source = frame_source(config, cmd.replay.as_deref(), cmd.looping, cmd.device);

    if cmd.watch {
        return watch_camera(config, cmd, &scanner, params, source).await;
    }

    let mut source = source;
    source.open().await?;
    let frame = source.next_frame().await;
    source.close().await;
    let Some(frame) = frame? else {
        bail!("{} produced no frames", source.name());
    };

    let (frame, outcome) = scan_frame(&scanner, frame, params).await?;
    if let Some(path) = &cmd.snapshot {
        save_image(&frame.image, path)?;
        info!(path = %path.display(), "Snapshot saved");
    }

    if cmd.json {
        let line = serde_json::json!({
            "sequence": frame.sequence,
            "captured_at": frame.captured_at,
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string_pretty(&line)?);
    } else if outcome.is_empty() {
        println!("No text detected");
    } else {
        println!("{}", outcome.text);
    }
    Ok(())
}

/// Print `outcome` if its text differs from the last printed text.
fn report_change(
    frame: &Frame,
    outcome: &OcrOutcome,
    last: &mut Option<blake3::Hash>,
    json: bool,
) -> anyhow::Result<()> {
    let hash = blake3::hash(outcome.text.as_bytes());
    if *last == Some(hash) {
        return Ok(());
    }
    *last = Some(hash);

    if json {
        let line = serde_json::json!({
            "sequence": frame.sequence,
            "captured_at": frame.captured_at,
            "outcome": outcome,
        });
        println!("{}", serde_json::to_string(&line)?);
    } else {
        let text = if outcome.is_empty() {
            "No text detected"
        } else {
            outcome.text.as_str()
        };
        println!("[{}] {text}", frame.captured_at.format("%H:%M:%S"));
    }
    Ok(())
}

async fn watch_camera(
    config: &Config,
    cmd: &CameraCommand,
    scanner: &Scanner,
    params: ScanParams,
    source: Box<dyn FrameSource>,
) -> anyhow::Result<()> {
    let pump = FramePump::new(source).with_interval(config.frame_interval());
    let handle = pump.handle();
    let (mut rx, task) = pump.start();

    let mut ticker = tokio::time::interval(Duration::from_millis(cmd.interval_ms.max(1)));
    let mut latest: Option<Frame> = None;
    let mut last_hash = None;
    let mut scanned = 0u64;
    let limit_reached = |scanned: u64| cmd.frames.is_some_and(|n| scanned >= n);

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(PumpEvent::Frame(frame)) => latest = Some(frame),
                Some(PumpEvent::Error(message)) => {
                    eprintln!("Camera error: {message}");
                    break;
                }
                Some(PumpEvent::Finished) | None => {
                    if let Some(frame) = latest.take() {
                        let (frame, outcome) = scan_frame(scanner, frame, params).await?;
                        report_change(&frame, &outcome, &mut last_hash, cmd.json)?;
                    }
                    break;
                }
            },
            _ = ticker.tick() => {
                if let Some(frame) = latest.take() {
                    let (frame, outcome) = scan_frame(scanner, frame, params).await?;
                    report_change(&frame, &outcome, &mut last_hash, cmd.json)?;
                    scanned += 1;
                    if limit_reached(scanned) {
                        break;
                    }
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    drop(rx);
    let stats = stop_pump(&handle, task).await;
    info!(
        scanned,
        delivered = stats.delivered,
        dropped = stats.dropped,
        "Watch finished"
    );
    Ok(())
}

async fn stop_pump(handle: &PumpHandle, task: JoinHandle<PumpStats>) -> PumpStats {
    handle.stop();
    match task.await {
        Ok(stats) => stats,
        Err(e) => {
            warn!(error = %e, "Frame pump task failed");
            handle.stats()
        }
    }
}

/// A running camera in the shell.
struct LiveCamera {
    handle: PumpHandle,
    task: JoinHandle<PumpStats>,
    events: mpsc::Receiver<PumpEvent>,
}

impl LiveCamera {
    /// Close the event channel, then stop the pump and wait for it.
    async fn stop(self) -> PumpStats {
        let Self {
            handle,
            task,
            events,
        } = self;
        drop(events);
        stop_pump(&handle, task).await
    }
}

impl std::fmt::Debug for LiveCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveCamera")
            .field("running", &self.handle.is_running())
            .finish_non_exhaustive()
    }
}

async fn next_event(camera: &mut Option<LiveCamera>) -> Option<PumpEvent> {
    match camera {
        Some(live) => live.events.recv().await,
        None => std::future::pending().await,
    }
}

fn prompt() {
    print!("txtscan> ");
    let _ = std::io::stdout().flush();
}

async fn handle_shell(config: &Config, cmd: &ShellCommandArgs) -> anyhow::Result<()> {
    init_platform()?;
    let mut session = Session::new(config, Scanner::from_config(config));
    if let Some(path) = &cmd.image {
        session.load_image(path);
        println!("[{}]", session.status());
    }

    println!("Type 'help' for commands.");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut camera: Option<LiveCamera> = None;
    prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    prompt();
                    continue;
                }

                let command = match line.parse::<ShellCommand>() {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{e}");
                        prompt();
                        continue;
                    }
                };

                // OCR blocks on the tesseract process
                let action = tokio::task::block_in_place(|| shell::execute(&mut session, command));
                match action {
                    Ok(ShellAction::Print(reply)) => println!("{reply}"),
                    Ok(ShellAction::Quit) => break,
                    Ok(ShellAction::StartCamera) => {
                        if camera.is_some() {
                            println!("[Camera already running]");
                        } else {
                            let source = frame_source(config, cmd.replay.as_deref(), cmd.looping, None);
                            let pump = FramePump::new(source).with_interval(config.frame_interval());
                            let handle = pump.handle();
                            let (events, task) = pump.start();
                            camera = Some(LiveCamera { handle, task, events });
                            session.camera_started();
                            println!("[{}]", session.status());
                        }
                    }
                    Ok(ShellAction::StopCamera) => {
                        if let Some(live) = camera.take() {
                            let _ = live.stop().await;
                            session.camera_stopped();
                        }
                        println!("[{}]", session.status());
                    }
                    Err(e) => println!("Error: {e}"),
                }
                prompt();
            }
            event = next_event(&mut camera) => {
                match event {
                    Some(PumpEvent::Frame(frame)) => session.on_camera_frame(frame),
                    Some(PumpEvent::Error(message)) => {
                        if let Some(live) = camera.take() {
                            let _ = live.stop().await;
                        }
                        session.on_camera_error(&message);
                        println!("\n[{}]", session.status());
                        prompt();
                    }
                    Some(PumpEvent::Finished) | None => {
                        if let Some(live) = camera.take() {
                            let _ = live.stop().await;
                        }
                        session.camera_stopped();
                        println!("\n[{}]", session.status());
                        prompt();
                    }
                }
            }
        }
    }

    if let Some(live) = camera.take() {
        let stats = live.stop().await;
        info!(delivered = stats.delivered, dropped = stats.dropped, "Camera stopped");
    }
    Ok(())
}

async fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let tesseract = TesseractEngine::version();
    let ffmpeg = ffmpeg_available(config.camera.ffmpeg_path.as_deref()).await;
    let device = platform::device_name(config.camera.camera_index);

    if json {
        let status = serde_json::json!({
            "platform": platform::platform_name(),
            "tesseract": tesseract.as_ref().ok(),
            "tesseract_error": tesseract.as_ref().err().map(ToString::to_string),
            "tesseract_args": config.tesseract_args_string(),
            "ffmpeg_available": ffmpeg,
            "capture_format": platform::capture_format(),
            "camera_device": device,
            "config_path": Config::default_config_path(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("txtscan status");
        println!("--------------");
        println!("Platform:      {}", platform::platform_name());
        match &tesseract {
            Ok(version) => println!("Tesseract:     {version}"),
            Err(e) => println!("Tesseract:     unavailable ({e})"),
        }
        println!("OCR args:      {}", config.tesseract_args_string());
        println!(
            "ffmpeg:        {}",
            if ffmpeg { "available" } else { "not found" }
        );
        println!(
            "Camera:        {} ({})",
            device,
            platform::capture_format()
        );
        println!("Config:        {}", Config::default_config_path().display());
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Camera]");
                println!("  Index:              {}", config.camera.camera_index);
                println!(
                    "  Resolution:         {}x{}",
                    config.camera.frame_width, config.camera.frame_height
                );
                println!("  FPS:                {}", config.camera.fps);
                if let Some(path) = &config.camera.ffmpeg_path {
                    println!("  ffmpeg:             {}", path.display());
                }
                println!();
                println!("[OCR]");
                println!("  Default mode:       {}", config.ocr.default_mode);
                println!("  Default threshold:  {}", config.ocr.default_threshold);
                println!("  Noise kernel:       {}", config.ocr.noise_filter_kernel);
                println!("  Morph iterations:   {}", config.ocr.morphology_iterations);
                println!(
                    "  Adaptive block/C:   {}/{}",
                    config.ocr.adaptive_threshold_block_size, config.ocr.adaptive_threshold_c
                );
                println!();
                println!("[Tesseract]");
                println!("  Args:               {}", config.tesseract_args_string());
                println!();
                println!("[Display]");
                println!("  Box color:          {:?}", config.display.box_color);
                println!("  Box thickness:      {}", config.display.box_thickness);
                println!();
                println!("[Files]");
                println!(
                    "  Formats:            {}",
                    config.files.supported_image_formats.join(", ")
                );
                println!("  Max dimension:      {}", config.files.max_image_dimension);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
