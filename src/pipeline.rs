use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::{
    config::RunConfig,
    encode::{FfmpegSink, FrameSink, PngDirSink, SinkConfig, TeeSink},
    error::SlowChangeResult,
    manifest::{ManifestEntry, ManifestWriter},
    scene::{load_scene, scene_groups, Scene},
    schedule::plan_scene,
    synth::synthesize,
};

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub rendered: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
}

/// Process every scene in the input directory, strictly sequentially,
/// encoding through ffmpeg and staging per-frame PNGs. A scene-fatal error
/// (missing still, blend mismatch, encoder failure) is logged and the batch
/// continues with the next scene; a failed scene writes no manifest entry.
/// Staging frames are cleared after each scene unless `keep_frames` is set,
/// bounding scratch storage to one scene's worth.
pub fn run_batch<R: Rng + ?Sized>(cfg: &RunConfig, rng: &mut R) -> SlowChangeResult<BatchSummary> {
    let staging_dir = cfg.staging_dir.clone();
    run_batch_with(cfg, rng, move |scene: &Scene, out_path: &Path| {
        Box::new(TeeSink::new(
            FfmpegSink::new(out_path, true),
            PngDirSink::new(&staging_dir, &scene.id),
        ))
    })
}

/// [`run_batch`] with an injectable per-scene sink factory, so the encoder
/// can be swapped for an in-memory or staging-only sink in tests.
pub fn run_batch_with<R, F>(
    cfg: &RunConfig,
    rng: &mut R,
    mut make_sink: F,
) -> SlowChangeResult<BatchSummary>
where
    R: Rng + ?Sized,
    F: FnMut(&Scene, &Path) -> Box<dyn FrameSink>,
{
    cfg.validate()?;
    std::fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("create output dir '{}'", cfg.output_dir.display()))?;
    std::fs::create_dir_all(&cfg.staging_dir)
        .with_context(|| format!("create staging dir '{}'", cfg.staging_dir.display()))?;

    let groups = scene_groups(&cfg.input_dir)?;
    if groups.is_empty() {
        warn!(dir = %cfg.input_dir.display(), "no still images found, nothing to do");
        return Ok(BatchSummary::default());
    }

    let manifest = ManifestWriter::new(cfg.output_dir.join("README.txt"));
    let mut summary = BatchSummary::default();

    for (scene_id, files) in &groups {
        info!(scene = %scene_id, stills = files.len(), "processing scene");
        let result = load_scene(&cfg.input_dir, scene_id, files, &cfg.colors)
            .and_then(|scene| render_scene(&scene, cfg, rng, &manifest, &mut make_sink));
        match result {
            Ok(path) => {
                info!(scene = %scene_id, video = %path.display(), "scene rendered");
                summary.rendered.push(path);
            }
            Err(err) => {
                error!(scene = %scene_id, %err, "scene failed, continuing with next");
                summary.failed.push((scene_id.clone(), err.to_string()));
            }
        }
        if !cfg.keep_frames {
            clear_staging(&cfg.staging_dir)?;
        }
    }

    Ok(summary)
}

fn render_scene<R: Rng + ?Sized>(
    scene: &Scene,
    cfg: &RunConfig,
    rng: &mut R,
    manifest: &ManifestWriter,
    make_sink: &mut dyn FnMut(&Scene, &Path) -> Box<dyn FrameSink>,
) -> SlowChangeResult<PathBuf> {
    let timing = cfg.timing();
    let plan = plan_scene(scene, &timing, rng);
    debug!(
        start = %plan.start_color,
        end = %plan.end_color,
        order = ?plan.order,
        onsets = ?plan.onsets,
        "schedule planned"
    );

    let (width, height) = scene.frame_dims()?;
    let out_path = cfg
        .output_dir
        .join(format!("{}_{}.mp4", scene.id, cfg.colors.label()));

    let mut sink = make_sink(scene, &out_path);
    sink.begin(SinkConfig {
        width,
        height,
        fps: cfg.fps,
        hold_frames: cfg.hold_frames(),
    })?;
    synthesize(scene, &plan, &timing, sink.as_mut())?;
    sink.end()?;

    // The manifest entry lands only after a successful encode, so a failed
    // scene never appears in the report.
    manifest.append(&ManifestEntry::from_plan(scene, &plan))?;
    Ok(out_path)
}

/// Remove generated frame files from the staging directory, leaving the
/// directory itself in place. Idempotent.
fn clear_staging(dir: &Path) -> SlowChangeResult<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read staging dir '{}'", dir.display()))?;
    for entry in entries {
        let path = entry
            .with_context(|| format!("read staging dir '{}'", dir.display()))?
            .path();
        if path.extension().and_then(|e| e.to_str()) == Some("png") {
            std::fs::remove_file(&path)
                .with_context(|| format!("remove staged frame '{}'", path.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::config::{ColorPair, RunConfig};

    fn write_still(dir: &Path, name: &str, value: u8) {
        let data = vec![value; 2 * 2 * 3];
        image::save_buffer_with_format(
            dir.join(name),
            &data,
            2,
            2,
            image::ExtendedColorType::Rgb8,
            image::ImageFormat::Png,
        )
        .unwrap();
    }

    fn config_for(root: &Path) -> RunConfig {
        RunConfig {
            input_dir: root.join("stills"),
            output_dir: root.join("videos"),
            staging_dir: root.join("frames"),
            colors: ColorPair::new("Red", "Blue"),
            fps: 4,
            morph_seconds: 2,
            hold_seconds: 0,
            quick_window_frames: 4,
            active_window_fraction: 0.75,
            keep_frames: false,
        }
    }

    fn write_complete_scene(stills: &Path) {
        write_still(stills, "Img01_Red_noWin.png", 0);
        write_still(stills, "Img01_Red_yesWin.png", 50);
        write_still(stills, "Img01_Blue_noWin.png", 200);
        write_still(stills, "Img01_Blue_yesWin.png", 250);
    }

    /// Staging-only sink factory: exercises the full success path without an
    /// external encoder.
    fn staging_sink(
        staging: PathBuf,
    ) -> impl FnMut(&Scene, &Path) -> Box<dyn crate::encode::FrameSink> {
        move |scene, _| {
            Box::new(TeeSink::new(
                crate::encode::InMemorySink::new(),
                PngDirSink::new(&staging, &scene.id),
            ))
        }
    }

    #[test]
    fn successful_scene_writes_manifest_and_clears_staging() {
        let root = tempfile::tempdir().unwrap();
        let stills = root.path().join("stills");
        std::fs::create_dir_all(&stills).unwrap();
        write_complete_scene(&stills);

        let cfg = config_for(root.path());
        let mut rng = StdRng::seed_from_u64(5);
        let summary =
            run_batch_with(&cfg, &mut rng, staging_sink(cfg.staging_dir.clone())).unwrap();

        assert!(summary.failed.is_empty());
        assert_eq!(summary.rendered.len(), 1);
        assert!(summary.rendered[0].ends_with("Img01_RedBlue.mp4"));

        // Manifest entry lands only after the sink finished successfully.
        let manifest = std::fs::read_to_string(cfg.output_dir.join("README.txt")).unwrap();
        assert!(manifest.contains("This slow change video is of Img01."));
        assert!(manifest.contains("noWin changes to yesWin."));

        // Staging is empty once the scene completes.
        assert_eq!(std::fs::read_dir(&cfg.staging_dir).unwrap().count(), 0);
    }

    #[test]
    fn keep_frames_retains_the_staged_pngs() {
        let root = tempfile::tempdir().unwrap();
        let stills = root.path().join("stills");
        std::fs::create_dir_all(&stills).unwrap();
        write_complete_scene(&stills);

        let mut cfg = config_for(root.path());
        cfg.keep_frames = true;
        let mut rng = StdRng::seed_from_u64(5);
        let summary =
            run_batch_with(&cfg, &mut rng, staging_sink(cfg.staging_dir.clone())).unwrap();

        assert_eq!(summary.rendered.len(), 1);
        // total_frames = 8, so indices 0..=8 are staged.
        assert_eq!(std::fs::read_dir(&cfg.staging_dir).unwrap().count(), 9);
    }

    #[test]
    fn clear_staging_removes_only_generated_frames() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Img01_morph0.png"), b"x").unwrap();
        std::fs::write(dir.path().join("Img01_morph1.png"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        clear_staging(dir.path()).unwrap();
        clear_staging(dir.path()).unwrap(); // idempotent

        let left: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(left.len(), 1);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn incomplete_scene_fails_without_writing_a_manifest_entry() {
        let root = tempfile::tempdir().unwrap();
        let stills = root.path().join("stills");
        std::fs::create_dir_all(&stills).unwrap();
        // Scene declares a window feature but the Blue/yesWin still is absent.
        write_still(&stills, "Img01_Red_noWin.png", 0);
        write_still(&stills, "Img01_Red_yesWin.png", 50);
        write_still(&stills, "Img01_Blue_noWin.png", 200);

        let cfg = config_for(root.path());
        let mut rng = StdRng::seed_from_u64(1);
        let summary = run_batch(&cfg, &mut rng).unwrap();

        assert!(summary.rendered.is_empty());
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "Img01");
        assert!(summary.failed[0].1.contains("missing still image"));
        // No manifest entry for the failed scene.
        assert!(!cfg.output_dir.join("README.txt").exists());
        // Staging was cleared (and is empty, nothing was synthesized).
        assert_eq!(std::fs::read_dir(&cfg.staging_dir).unwrap().count(), 0);
    }

    #[test]
    fn empty_input_dir_is_a_clean_no_op() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("stills")).unwrap();
        let cfg = config_for(root.path());
        let mut rng = StdRng::seed_from_u64(1);
        let summary = run_batch(&cfg, &mut rng).unwrap();
        assert!(summary.rendered.is_empty());
        assert!(summary.failed.is_empty());
    }
}
