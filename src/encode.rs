use std::{
    io::Write as _,
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use anyhow::Context as _;

use crate::{
    error::{SlowChangeError, SlowChangeResult},
    raster::StillImage,
    synth::FrameIndex,
};

/// Configuration handed to a [`FrameSink`] before any frames are pushed.
#[derive(Clone, Debug)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Leading/trailing repeats of the first/last frame so the video holds
    /// on the start and end states.
    pub hold_frames: u64,
}

impl SinkConfig {
    pub fn validate(&self) -> SlowChangeResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SlowChangeError::validation(
                "sink width/height must be non-zero",
            ));
        }
        if self.fps == 0 {
            return Err(SlowChangeError::validation("sink fps must be non-zero"));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            // The default settings target yuv420p output for compatibility.
            return Err(SlowChangeError::validation(
                "sink width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        Ok(())
    }
}

/// Consumer of a synthesized frame sequence.
///
/// Ordering contract: `push_frame` is called in strictly increasing
/// `FrameIndex` order between `begin` and `end`.
pub trait FrameSink: Send {
    fn begin(&mut self, cfg: SinkConfig) -> SlowChangeResult<()>;
    fn push_frame(&mut self, idx: FrameIndex, frame: &StillImage) -> SlowChangeResult<()>;
    fn end(&mut self) -> SlowChangeResult<()>;
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> SlowChangeResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// The ffmpeg invocation, excluding the trailing output path: raw rgb24
/// frames on stdin, encoded to yuv420p H.264 for maximum player
/// compatibility.
fn ffmpeg_args(cfg: &SinkConfig, overwrite: bool) -> Vec<String> {
    let mut args: Vec<String> = vec![if overwrite { "-y" } else { "-n" }.to_string()];
    args.extend(
        [
            "-loglevel", "error", "-f", "rawvideo", "-pix_fmt", "rgb24",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push("-s".to_string());
    args.push(format!("{}x{}", cfg.width, cfg.height));
    args.push("-r".to_string());
    args.push(cfg.fps.to_string());
    args.extend(
        [
            "-i", "pipe:0", "-an", "-c:v", "libx264", "-crf", "25", "-pix_fmt", "yuv420p",
            "-movflags", "+faststart",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args
}

/// Pipes raw rgb24 frames into a spawned system `ffmpeg` and waits on it
/// synchronously at `end`. Hold repeats are written by replaying the first
/// and last pushed frames `hold_frames` times.
pub struct FfmpegSink {
    out_path: PathBuf,
    overwrite: bool,
    cfg: Option<SinkConfig>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    pushed_any: bool,
    last: Vec<u8>,
}

impl FfmpegSink {
    pub fn new(out_path: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite,
            cfg: None,
            child: None,
            stdin: None,
            pushed_any: false,
            last: Vec::new(),
        }
    }

    fn write_raw(&mut self, data: &[u8]) -> SlowChangeResult<()> {
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(SlowChangeError::encode("ffmpeg sink is not begun"));
        };
        stdin.write_all(data).map_err(|e| {
            SlowChangeError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })
    }
}

impl FrameSink for FfmpegSink {
    fn begin(&mut self, cfg: SinkConfig) -> SlowChangeResult<()> {
        cfg.validate()?;
        ensure_parent_dir(&self.out_path)?;

        if !self.overwrite && self.out_path.exists() {
            return Err(SlowChangeError::validation(format!(
                "output file '{}' already exists",
                self.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(SlowChangeError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        // The system `ffmpeg` binary avoids native FFmpeg dev header/lib
        // requirements.
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.args(ffmpeg_args(&cfg, self.overwrite)).arg(&self.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            SlowChangeError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SlowChangeError::encode("failed to open ffmpeg stdin (unexpected)"))?;

        self.cfg = Some(cfg);
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.pushed_any = false;
        Ok(())
    }

    fn push_frame(&mut self, _idx: FrameIndex, frame: &StillImage) -> SlowChangeResult<()> {
        let Some(cfg) = self.cfg.clone() else {
            return Err(SlowChangeError::encode("ffmpeg sink is not begun"));
        };
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(SlowChangeError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }

        let repeats = if self.pushed_any {
            1
        } else {
            // Leading hold: the first frame appears 1 + hold_frames times.
            1 + cfg.hold_frames
        };
        for _ in 0..repeats {
            self.write_raw(&frame.data)?;
        }

        self.pushed_any = true;
        self.last = frame.data.clone();
        Ok(())
    }

    fn end(&mut self) -> SlowChangeResult<()> {
        let Some(child) = self.child.take() else {
            return Err(SlowChangeError::encode("ffmpeg sink is not begun"));
        };
        let hold = self.cfg.as_ref().map(|c| c.hold_frames).unwrap_or(0);

        // Trailing hold: replay the last frame.
        let last = std::mem::take(&mut self.last);
        if !last.is_empty() {
            for _ in 0..hold {
                self.write_raw(&last)?;
            }
        }

        drop(self.stdin.take());
        let output = child.wait_with_output().map_err(|e| {
            SlowChangeError::encode(format!("failed to wait for ffmpeg to finish: {e}"))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SlowChangeError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Writes each frame as `<prefix>_morph<index>.png` into a staging directory,
/// for inspection and debugging of the selected frames.
pub struct PngDirSink {
    dir: PathBuf,
    prefix: String,
    cfg: Option<SinkConfig>,
}

impl PngDirSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            cfg: None,
        }
    }
}

impl FrameSink for PngDirSink {
    fn begin(&mut self, cfg: SinkConfig) -> SlowChangeResult<()> {
        cfg.validate()?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create staging dir '{}'", self.dir.display()))?;
        self.cfg = Some(cfg);
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &StillImage) -> SlowChangeResult<()> {
        let path = self.dir.join(format!("{}_morph{}.png", self.prefix, idx.0));
        image::save_buffer_with_format(
            &path,
            &frame.data,
            frame.width,
            frame.height,
            image::ExtendedColorType::Rgb8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write staged frame '{}'", path.display()))?;
        Ok(())
    }

    fn end(&mut self) -> SlowChangeResult<()> {
        Ok(())
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, StillImage)>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg.clone()
    }

    pub fn frames(&self) -> &[(FrameIndex, StillImage)] {
        &self.frames
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> SlowChangeResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &StillImage) -> SlowChangeResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> SlowChangeResult<()> {
        Ok(())
    }
}

/// Fans one frame stream out to two sinks (e.g. the encoder and the PNG
/// staging directory).
pub struct TeeSink<A: FrameSink, B: FrameSink> {
    pub first: A,
    pub second: B,
}

impl<A: FrameSink, B: FrameSink> TeeSink<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: FrameSink, B: FrameSink> FrameSink for TeeSink<A, B> {
    fn begin(&mut self, cfg: SinkConfig) -> SlowChangeResult<()> {
        self.first.begin(cfg.clone())?;
        self.second.begin(cfg)
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &StillImage) -> SlowChangeResult<()> {
        self.first.push_frame(idx, frame)?;
        self.second.push_frame(idx, frame)
    }

    fn end(&mut self) -> SlowChangeResult<()> {
        self.first.end()?;
        self.second.end()
    }
}
