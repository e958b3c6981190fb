#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod context;
mod helpers;
mod modules;
mod theme;

use std::path::PathBuf;

use clap::Parser;
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Label video clips and mark query/target matches.
#[derive(Parser, Debug)]
#[command(name = "clipmark", version, about)]
struct Args {
    /// Annotation files to open, one tab each.
    files: Vec<PathBuf>,

    /// Playback rate for every viewer.
    #[arg(long)]
    fps: Option<u32>,

    /// Quiet period after navigating before clips are decoded.
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Maximum number of target viewers in a match document.
    #[arg(long = "targets")]
    max_target_viewers: Option<usize>,

    /// Frames wider than this are scaled down.
    #[arg(long = "max-width")]
    max_frame_width: Option<u32>,
}

impl Args {
    fn overrides(&self) -> app::ConfigOverrides {
        app::ConfigOverrides {
            fps:                self.fps,
            debounce_ms:        self.debounce_ms,
            max_target_viewers: self.max_target_viewers,
            max_frame_width:    self.max_frame_width,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    helpers::log::init();

    ffmpeg_the_third::init().map_err(|e| anyhow::anyhow!("FFmpeg init failed: {e}"))?;
    tracing::info!("[main] clipmark {} starting, {} file(s) on the command line",
        env!("CARGO_PKG_VERSION"), args.files.len());

    let native_options = eframe::NativeOptions {
        centered: true,
        viewport: egui::ViewportBuilder::default()
            .with_title("clipmark")
            .with_inner_size([1280.0, 860.0])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    };

    let overrides = args.overrides();
    let files     = args.files;
    eframe::run_native(
        "clipmark",
        native_options,
        Box::new(move |cc| Ok(Box::new(app::ClipmarkApp::new(cc, overrides, files)))),
    )
    .map_err(|e| anyhow::anyhow!("{e}"))
}
