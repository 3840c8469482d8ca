use std::{
    fs::OpenOptions,
    io::Write as _,
    path::{Path, PathBuf},
};

use anyhow::Context as _;

use crate::{
    error::SlowChangeResult,
    scene::Scene,
    schedule::SchedulePlan,
};

/// One scene's manifest record: color direction plus the ordered list of
/// quick changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub scene_id: String,
    pub start_color: String,
    pub end_color: String,
    /// `(from_value, to_value)` per change, in onset order.
    pub changes: Vec<(String, String)>,
}

impl ManifestEntry {
    pub fn from_plan(scene: &Scene, plan: &SchedulePlan) -> Self {
        Self {
            scene_id: scene.id.clone(),
            start_color: plan.start_color.clone(),
            end_color: plan.end_color.clone(),
            changes: plan
                .order
                .iter()
                .map(|&dim| {
                    let f = &scene.features[dim];
                    (f.pre().to_string(), f.post().to_string())
                })
                .collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "This slow change video is of {}.\n",
            self.scene_id
        ));
        out.push_str(&format!(
            "The beginning color is {} and the ending color is {}.\n",
            self.start_color, self.end_color
        ));
        out.push_str(&format!(
            "There are {} quick changes which occur as follows:\n",
            self.changes.len()
        ));
        for (from, to) in &self.changes {
            out.push_str(&format!("{from} changes to {to}.\n"));
        }
        out
    }
}

/// Append-only writer for the shared human-readable report. Creates the file
/// on first use; never rewrites prior entries.
#[derive(Clone, Debug)]
pub struct ManifestWriter {
    path: PathBuf,
}

impl ManifestWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &ManifestEntry) -> SlowChangeResult<()> {
        let needs_separator = std::fs::metadata(&self.path)
            .map(|m| m.len() > 0)
            .unwrap_or(false);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open manifest '{}'", self.path.display()))?;

        if needs_separator {
            writeln!(file).context("append manifest separator")?;
        }
        file.write_all(entry.render().as_bytes())
            .with_context(|| format!("append manifest entry for '{}'", entry.scene_id))?;
        Ok(())
    }
}
