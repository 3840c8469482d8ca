#![forbid(unsafe_code)]

pub mod config;
pub mod encode;
pub mod error;
pub mod manifest;
pub mod pipeline;
pub mod raster;
pub mod scene;
pub mod schedule;
pub mod synth;

pub use config::{ColorPair, RunConfig, Timing};
pub use encode::{FfmpegSink, FrameSink, InMemorySink, PngDirSink, SinkConfig, TeeSink};
pub use error::{SlowChangeError, SlowChangeResult};
pub use manifest::{ManifestEntry, ManifestWriter};
pub use pipeline::{run_batch, run_batch_with, BatchSummary};
pub use raster::{blend, pad_to_even, StillImage};
pub use scene::{load_scene, scene_groups, FeatureDim, Scene};
pub use schedule::{plan_scene, SchedulePlan};
pub use synth::{synthesize, FrameIndex};
