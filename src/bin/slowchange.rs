use std::path::PathBuf;

use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::EnvFilter;

use slowchange::{ColorPair, RunConfig};

/// Render slow-change stimulus videos from a directory of component stills.
///
/// Stills are named `<scene>_<color>_<feature1>_..._<featureN>.<ext>`; every
/// color x feature combination a scene declares must be present. One MP4 is
/// written per scene, plus an appended README.txt manifest.
#[derive(Parser, Debug)]
#[command(name = "slowchange", version)]
struct Cli {
    /// Directory holding the component still images.
    #[arg(long = "in", required_unless_present = "config")]
    input_dir: Option<PathBuf>,

    /// Directory for the final videos and the README.txt manifest.
    #[arg(long = "out", required_unless_present = "config")]
    output_dir: Option<PathBuf>,

    /// Staging directory for per-scene frame PNGs (cleared after each scene).
    #[arg(long, default_value = "morph_frames")]
    staging_dir: PathBuf,

    /// The batch's two color names, e.g. `Yellow,Orange`.
    #[arg(long, required_unless_present = "config")]
    colors: Option<ColorPair>,

    /// Frames per second of the output video.
    #[arg(long, default_value_t = 12)]
    fps: u32,

    /// Duration of the slow color morph, in seconds.
    #[arg(long, default_value_t = 16)]
    morph_seconds: u32,

    /// Seconds of held start/end frames before and after the morph.
    #[arg(long, default_value_t = 2)]
    hold_seconds: u32,

    /// Length of each quick-change ease in frames (defaults to one second).
    #[arg(long)]
    quick_window_frames: Option<u64>,

    /// Central fraction of each change's time section where its onset may land.
    #[arg(long, default_value_t = 0.75)]
    active_window_fraction: f64,

    /// Seed for the schedule randomness; omit for a fresh draw per run.
    #[arg(long)]
    seed: Option<u64>,

    /// Keep the staged frame PNGs instead of clearing them per scene.
    #[arg(long)]
    keep_frames: bool,

    /// Load the full run configuration from a JSON file instead of flags.
    #[arg(long, conflicts_with_all = ["input_dir", "output_dir", "colors"])]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<RunConfig> {
        if let Some(path) = &self.config {
            return Ok(RunConfig::from_json_file(path)?);
        }
        // required_unless_present guarantees these are set when --config is
        // absent.
        let (Some(input_dir), Some(output_dir), Some(colors)) =
            (self.input_dir, self.output_dir, self.colors)
        else {
            anyhow::bail!("--in, --out and --colors are required without --config");
        };
        Ok(RunConfig {
            input_dir,
            output_dir,
            staging_dir: self.staging_dir,
            colors,
            fps: self.fps,
            morph_seconds: self.morph_seconds,
            hold_seconds: self.hold_seconds,
            quick_window_frames: self.quick_window_frames.unwrap_or(u64::from(self.fps)),
            active_window_fraction: self.active_window_fraction,
            keep_frames: self.keep_frames,
        })
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let seed = cli.seed;
    let cfg = cli.into_config()?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let summary = slowchange::run_batch(&cfg, &mut rng)?;
    eprintln!(
        "rendered {} scene(s), {} failed",
        summary.rendered.len(),
        summary.failed.len()
    );
    if !summary.failed.is_empty() {
        for (scene, err) in &summary.failed {
            eprintln!("  {scene}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}
