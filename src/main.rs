mod capture;
mod compositor;
mod keying;
mod output;
mod overlay;
mod recording;
mod session;

use anyhow::{Context, Result};
use capture::WebcamCapture;
use clap::Parser;
use compositor::Compositor;
use keying::types::{Rgb, DEFAULT_KEY_COLOR};
use keying::{parse_hex_color, KeyColorConfig};
use output::{DirectoryDownload, NoShare, OutputSink, V4L2Output};
use overlay::{load_overlay, select_strategy, OverlayTexture, PlatformCaps};
use recording::{GifEncoderFactory, RecordingConfig};
use session::{spawn_control_reader, ControlCommand, Flow, Initializer, Photobooth};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Ideal capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Ideal capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Viewport width in logical pixels
    #[arg(long, default_value_t = 1280)]
    viewport_width: u32,

    /// Viewport height in logical pixels
    #[arg(long, default_value_t = 720)]
    viewport_height: u32,

    /// Device pixel ratio (capped at 1.5)
    #[arg(long, default_value_t = 1.0)]
    pixel_ratio: f32,

    /// Display refresh rate driving the render loop
    #[arg(long, default_value_t = 60)]
    fps: u32,

    /// Recording frame rate
    #[arg(long, default_value_t = 20)]
    record_fps: u32,

    /// Overlay clip (animated GIF/APNG or still image)
    #[arg(long, default_value = "assets/overlay.gif")]
    overlay: PathBuf,

    /// Give up on the overlay after this many milliseconds
    #[arg(long, default_value_t = 8000)]
    overlay_timeout_ms: u64,

    /// Key color as #RRGGBB
    #[arg(long, default_value = DEFAULT_KEY_COLOR, value_parser = parse_hex_color)]
    key_color: Rgb,

    #[arg(long, default_value_t = 0.5)]
    similarity: f32,

    #[arg(long, default_value_t = 0.2)]
    smoothness: f32,

    /// Horizontal overlay shift as a fraction of viewport width
    #[arg(long, default_value_t = 0.3, allow_negative_numbers = true)]
    offset_x: f32,

    /// Always copy overlay frames instead of sampling them directly
    #[arg(long)]
    copy_strategy: bool,

    /// Optional v4l2loopback device for the live composite
    #[arg(short, long)]
    preview_device: Option<String>,

    /// Where downloaded photos and videos are written
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Start with keying debug mode on (overlay drawn opaque, no keying)
    #[arg(long)]
    shader_debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("arbooth starting");
    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!("Viewport: {}x{}", args.viewport_width, args.viewport_height);
    tracing::info!("Display FPS: {}, recording FPS: {}", args.fps, args.record_fps);

    let controls = spawn_control_reader();
    let overlay_timeout = Duration::from_millis(args.overlay_timeout_ms);

    // Overlay loads while the camera is being acquired
    let overlay_path = args.overlay.clone();
    let overlay_loader = thread::spawn(move || load_overlay(&overlay_path, overlay_timeout));

    let Some(camera) = acquire_camera(&args, &controls) else {
        tracing::info!("Exiting before initialization completed");
        return Ok(());
    };

    let (clip, placeholder) = overlay_loader
        .join()
        .unwrap_or_else(|_| (overlay::placeholder_clip(), true));

    let now = Instant::now();
    let texture = OverlayTexture::new(
        clip,
        select_strategy(PlatformCaps::probe(args.copy_strategy)),
        placeholder,
        now,
    );
    if texture.is_placeholder() {
        tracing::warn!("Running with the placeholder overlay");
    }

    let mut keying = KeyColorConfig::new(args.key_color, args.similarity, args.smoothness);
    keying.debug_mode = args.shader_debug;
    let compositor = Compositor::new(
        (args.viewport_width, args.viewport_height),
        args.pixel_ratio,
        args.offset_x,
        keying,
    );

    let recording = RecordingConfig {
        fps: args.record_fps,
        ..RecordingConfig::default()
    };

    let mut booth = Photobooth::new(
        Box::new(camera),
        compositor,
        texture,
        recording,
        Box::new(GifEncoderFactory),
        Box::new(NoShare),
        Box::new(DirectoryDownload::new(args.output_dir.clone())),
        overlay_timeout,
    );

    let mut preview = match &args.preview_device {
        Some(path) => {
            let (w, h) = booth.compositor().surface_size();
            Some(V4L2Output::new(path, w, h).context("Failed to initialize preview output")?)
        }
        None => None,
    };

    run_booth(&mut booth, preview.as_mut(), &controls, args.fps)
}

/// Acquire the camera, waiting for `retry` after each failure
///
/// Returns `None` when the user quits instead of retrying.
fn acquire_camera(args: &Args, controls: &Receiver<ControlCommand>) -> Option<WebcamCapture> {
    let mut init = Initializer::default();
    loop {
        init.begin();
        match WebcamCapture::open(args.input_device, args.capture_width, args.capture_height) {
            Ok(camera) => {
                init.succeed();
                tracing::info!("Camera ready after {} attempt(s)", init.attempts());
                return Some(camera);
            }
            Err(e) => {
                init.fail(e);
                if let Some(message) = init.retry_message() {
                    tracing::error!("{} Type 'retry' to try again or 'quit' to exit.", message);
                }
            }
        }

        loop {
            match controls.recv() {
                Ok(ControlCommand::Retry) => break,
                Ok(ControlCommand::Quit) | Err(_) => return None,
                Ok(other) => tracing::debug!("Ignoring {:?} until initialized", other),
            }
        }
    }
}

fn run_booth(
    booth: &mut Photobooth,
    mut preview: Option<&mut V4L2Output>,
    controls: &Receiver<ControlCommand>,
    target_fps: u32,
) -> Result<()> {
    let frame_duration = Duration::from_secs_f32(1.0 / target_fps.max(1) as f32);
    let stats_every = u64::from(target_fps.max(1)) * 5;
    let mut frame_count = 0u64;
    let mut total_frame_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;
    let mut controls_open = true;

    tracing::info!("Starting booth loop");
    tracing::info!("Commands: shoot, press, release, share, download, discard, quit");

    'run: loop {
        let loop_start = Instant::now();

        while controls_open {
            match controls.try_recv() {
                Ok(command) => {
                    if booth.handle(command, loop_start) == Flow::Quit {
                        break 'run;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("Control input closed, press Ctrl+C to stop");
                    controls_open = false;
                }
            }
        }

        booth.frame(loop_start);
        total_frame_time += loop_start.elapsed();

        if let Some(output) = preview.as_deref_mut() {
            let output_start = Instant::now();
            let frame = booth.preview_frame(output.resolution());
            if let Err(e) = output.write_frame(&frame) {
                tracing::warn!("Preview frame dropped: {:#}", e);
            }
            total_output_time += output_start.elapsed();
        }

        frame_count += 1;

        if frame_count % stats_every == 0 {
            let avg_frame_ms = total_frame_time.as_secs_f64() * 1000.0 / frame_count as f64;
            let avg_output_ms = total_output_time.as_secs_f64() * 1000.0 / frame_count as f64;
            tracing::info!(
                "Frame {}: composite={:.1}ms, preview={:.1}ms, mode={:?}, progress={:.0}%, rendered={}",
                frame_count,
                avg_frame_ms,
                avg_output_ms,
                booth.mode(),
                booth.progress() * 100.0,
                booth.compositor().frames_rendered()
            );
        }

        // Frame rate limiting
        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            thread::sleep(frame_duration - elapsed);
        }
    }

    booth.finish();
    if let Some(artifact) = booth.preview().current() {
        tracing::info!("Unsaved {} left in preview", artifact.filename());
    }
    tracing::info!("arbooth stopped");
    Ok(())
}
