use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context as _;

use crate::error::{SlowChangeError, SlowChangeResult};

/// The two color endpoints of the slow change, in batch (not playback) order.
/// Playback direction is chosen per scene by the schedule planner.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize)]
pub struct ColorPair {
    pub first: String,
    pub second: String,
}

impl ColorPair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    pub fn contains(&self, color: &str) -> bool {
        self.first == color || self.second == color
    }

    /// Label used in output video filenames, e.g. "YellowOrange".
    pub fn label(&self) -> String {
        format!("{}{}", self.first, self.second)
    }
}

impl FromStr for ColorPair {
    type Err = SlowChangeError;

    fn from_str(s: &str) -> SlowChangeResult<Self> {
        let sep = if s.contains(',') { ',' } else { '_' };
        let mut parts = s.split(sep).map(str::trim).filter(|p| !p.is_empty());
        match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), None) if a != b => Ok(Self::new(a, b)),
            _ => Err(SlowChangeError::validation(format!(
                "color pair must be two distinct names like 'Yellow,Orange', got '{s}'"
            ))),
        }
    }
}

/// Timing parameters shared by the schedule planner and the synthesizer.
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    /// Number of morph steps; the sequence holds `total_frames + 1` frames.
    pub total_frames: u64,
    /// Length of a quick-change ease, in frames.
    pub quick_window_frames: u64,
    /// Central fraction of each change's time section where its onset may land.
    pub active_window_fraction: f64,
}

/// Immutable per-batch run configuration. Built once (CLI flags or a JSON
/// file) and passed by reference into every component.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct RunConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub staging_dir: PathBuf,
    pub colors: ColorPair,
    pub fps: u32,
    pub morph_seconds: u32,
    pub hold_seconds: u32,
    pub quick_window_frames: u64,
    pub active_window_fraction: f64,
    #[serde(default)]
    pub keep_frames: bool,
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> SlowChangeResult<Self> {
        let f = File::open(path).with_context(|| format!("open config '{}'", path.display()))?;
        let cfg: RunConfig =
            serde_json::from_reader(BufReader::new(f)).context("parse config JSON")?;
        Ok(cfg)
    }

    pub fn total_frames(&self) -> u64 {
        u64::from(self.fps) * u64::from(self.morph_seconds)
    }

    pub fn hold_frames(&self) -> u64 {
        u64::from(self.fps) * u64::from(self.hold_seconds)
    }

    pub fn timing(&self) -> Timing {
        Timing {
            total_frames: self.total_frames(),
            quick_window_frames: self.quick_window_frames,
            active_window_fraction: self.active_window_fraction,
        }
    }

    pub fn validate(&self) -> SlowChangeResult<()> {
        if self.fps == 0 {
            return Err(SlowChangeError::validation("fps must be non-zero"));
        }
        if self.morph_seconds == 0 {
            return Err(SlowChangeError::validation("morph-seconds must be non-zero"));
        }
        if self.quick_window_frames == 0 {
            return Err(SlowChangeError::validation(
                "quick-window-frames must be non-zero",
            ));
        }
        if self.quick_window_frames > self.total_frames() {
            return Err(SlowChangeError::validation(
                "quick-window-frames must not exceed the morph length",
            ));
        }
        if !(self.active_window_fraction > 0.0 && self.active_window_fraction <= 1.0) {
            return Err(SlowChangeError::validation(
                "active-window-fraction must be in (0, 1]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> RunConfig {
        RunConfig {
            input_dir: PathBuf::from("in"),
            output_dir: PathBuf::from("out"),
            staging_dir: PathBuf::from("staging"),
            colors: ColorPair::new("Yellow", "Orange"),
            fps: 12,
            morph_seconds: 16,
            hold_seconds: 2,
            quick_window_frames: 12,
            active_window_fraction: 0.75,
            keep_frames: false,
        }
    }

    #[test]
    fn color_pair_parses_comma_and_underscore() {
        let p: ColorPair = "Yellow,Orange".parse().unwrap();
        assert_eq!(p, ColorPair::new("Yellow", "Orange"));
        let p: ColorPair = "Yellow_Orange".parse().unwrap();
        assert_eq!(p.label(), "YellowOrange");
    }

    #[test]
    fn color_pair_rejects_one_or_equal_names() {
        assert!("Yellow".parse::<ColorPair>().is_err());
        assert!("Yellow,Yellow".parse::<ColorPair>().is_err());
        assert!("a,b,c".parse::<ColorPair>().is_err());
    }

    #[test]
    fn derived_frame_counts() {
        let cfg = base_config();
        assert_eq!(cfg.total_frames(), 192);
        assert_eq!(cfg.hold_frames(), 24);
    }

    #[test]
    fn validate_catches_bad_values() {
        let mut cfg = base_config();
        cfg.fps = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = base_config();
        cfg.quick_window_frames = 1000;
        assert!(cfg.validate().is_err());

        let mut cfg = base_config();
        cfg.active_window_fraction = 0.0;
        assert!(cfg.validate().is_err());

        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn config_json_round_trips_through_serde() {
        let json = r#"{
            "input_dir": "stills",
            "output_dir": "videos",
            "staging_dir": "frames",
            "colors": { "first": "Yellow", "second": "Orange" },
            "fps": 12,
            "morph_seconds": 16,
            "hold_seconds": 2,
            "quick_window_frames": 12,
            "active_window_fraction": 0.75
        }"#;
        let cfg: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.colors.label(), "YellowOrange");
        assert!(!cfg.keep_frames);
        assert!(cfg.validate().is_ok());
    }
}
