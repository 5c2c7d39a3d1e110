use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    author = "Alexander Heilmeier <alexander.heilmeier@tum.de>",
    name = "LT-MAP",
    about = "Smooth live track map for sparse race telemetry written in Rust"
)]
pub struct LiveOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging
    #[clap(short, long)]
    pub debug: bool,

    /// Activate GUI - the synthetic feed runs in real-time and the live map is drawn
    #[clap(short, long)]
    pub gui: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set path to the parameter file
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set replay duration in seconds (in GUI mode the feed stops afterwards)
    #[clap(short = 't', long, default_value = "120.0")]
    pub duration: f64,

    /// Set real-time factor of the synthetic feed (only relevant in GUI mode)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Restrict mini-segment colouring to a single car
    #[clap(short, long)]
    pub focus_car: Option<u32>,

    /// Set frame rate of the headless replay in Hz
    #[clap(long, default_value = "60.0")]
    pub frame_rate: f64,
}
