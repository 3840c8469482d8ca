use std::{
    collections::{BTreeMap, HashMap},
    path::Path,
};

use anyhow::Context as _;

use crate::{
    config::ColorPair,
    error::{SlowChangeError, SlowChangeResult},
    raster::StillImage,
};

/// File extensions accepted as still images.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff"];

/// Filename segment delimiter: `<scene>_<color>_<feature1>_..._<featureN>.<ext>`.
const DELIMITER: char = '_';

/// One binary feature dimension. `values[0]` is the pre-change value (the
/// first value observed in filename-sorted order), `values[1]` the post-change
/// value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureDim {
    pub values: [String; 2],
}

impl FeatureDim {
    pub fn new(pre: impl Into<String>, post: impl Into<String>) -> Self {
        Self {
            values: [pre.into(), post.into()],
        }
    }

    pub fn pre(&self) -> &str {
        &self.values[0]
    }

    pub fn post(&self) -> &str {
        &self.values[1]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct StillKey {
    color: String,
    values: Vec<String>,
}

/// A validated stimulus unit: every color x feature combination the declared
/// schema implies is backed by exactly one loaded still.
#[derive(Debug)]
pub struct Scene {
    pub id: String,
    pub colors: [String; 2],
    pub features: Vec<FeatureDim>,
    stills: HashMap<StillKey, StillImage>,
}

impl Scene {
    pub fn new(
        id: impl Into<String>,
        colors: [String; 2],
        features: Vec<FeatureDim>,
        stills: impl IntoIterator<Item = ((String, Vec<String>), StillImage)>,
    ) -> SlowChangeResult<Self> {
        let stills = stills
            .into_iter()
            .map(|((color, values), img)| (StillKey { color, values }, img))
            .collect();
        let scene = Self {
            id: id.into(),
            colors,
            features,
            stills,
        };
        scene.verify_complete()?;
        Ok(scene)
    }

    /// The data-model invariant: absence of any declared combination is fatal.
    fn verify_complete(&self) -> SlowChangeResult<()> {
        for color in &self.colors {
            for values in all_combinations(&self.features) {
                let key = StillKey {
                    color: color.clone(),
                    values,
                };
                if !self.stills.contains_key(&key) {
                    return Err(SlowChangeError::missing_still(format!(
                        "scene '{}' has no still for color '{}' with features [{}]",
                        self.id,
                        key.color,
                        key.values.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn still(&self, color: &str, values: &[String]) -> SlowChangeResult<&StillImage> {
        let key = StillKey {
            color: color.to_string(),
            values: values.to_vec(),
        };
        self.stills.get(&key).ok_or_else(|| {
            SlowChangeError::missing_still(format!(
                "scene '{}' has no still for color '{}' with features [{}]",
                self.id,
                color,
                values.join(", ")
            ))
        })
    }

    /// The all-pre-change feature vector (the frame-0 state).
    pub fn initial_values(&self) -> Vec<String> {
        self.features.iter().map(|f| f.pre().to_string()).collect()
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }

    /// Output frame dimensions after even-padding.
    pub fn frame_dims(&self) -> SlowChangeResult<(u32, u32)> {
        let still = self.still(&self.colors[0], &self.initial_values())?;
        Ok((still.width + still.width % 2, still.height + still.height % 2))
    }
}

fn all_combinations(features: &[FeatureDim]) -> Vec<Vec<String>> {
    (0..(1u32 << features.len()))
        .map(|mask| {
            features
                .iter()
                .enumerate()
                .map(|(i, f)| f.values[usize::from(mask >> i & 1 == 1)].clone())
                .collect()
        })
        .collect()
}

/// Partition the input directory's image files into per-scene filename groups,
/// keyed and sorted by scene id. Non-image files are ignored.
pub fn scene_groups(dir: &Path) -> SlowChangeResult<BTreeMap<String, Vec<String>>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read input dir '{}'", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("read input dir '{}'", dir.display()))?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        let Some((stem, ext)) = name.rsplit_once('.') else {
            continue;
        };
        if !IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
            continue;
        }
        let Some((scene_id, _)) = stem.split_once(DELIMITER) else {
            return Err(SlowChangeError::validation(format!(
                "filename '{name}' does not match <scene>_<color>_<features...>.<ext>"
            )));
        };
        groups.entry(scene_id.to_string()).or_default().push(name);
    }

    for files in groups.values_mut() {
        files.sort();
    }
    Ok(groups)
}

/// Build one scene from its filename group: derive the feature schema from the
/// observed segments, load every still, and validate completeness. Scene-fatal
/// errors (inconsistent names, non-binary feature values, missing stills)
/// surface here, before any frame is synthesized.
pub fn load_scene(
    dir: &Path,
    scene_id: &str,
    file_names: &[String],
    colors: &ColorPair,
) -> SlowChangeResult<Scene> {
    let mut parsed: Vec<(Vec<String>, &str)> = Vec::with_capacity(file_names.len());
    for name in file_names {
        let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
        let segments: Vec<String> = stem.split(DELIMITER).map(str::to_string).collect();
        if segments.len() < 2 {
            return Err(SlowChangeError::validation(format!(
                "filename '{name}' does not match <scene>_<color>_<features...>.<ext>"
            )));
        }
        if !colors.contains(&segments[1]) {
            return Err(SlowChangeError::validation(format!(
                "scene '{scene_id}': color '{}' in '{name}' is not part of the batch pair {}/{}",
                segments[1], colors.first, colors.second
            )));
        }
        parsed.push((segments, name));
    }

    let feature_count = parsed
        .first()
        .map(|(segments, _)| segments.len() - 2)
        .ok_or_else(|| {
            SlowChangeError::validation(format!("scene '{scene_id}' has no image files"))
        })?;
    if let Some((_, name)) = parsed
        .iter()
        .find(|(segments, _)| segments.len() - 2 != feature_count)
    {
        return Err(SlowChangeError::validation(format!(
            "scene '{scene_id}': '{name}' declares a different number of feature segments \
             than the rest of the scene"
        )));
    }

    // Feature identity comes from the observed values per segment position;
    // the first value in filename-sorted order is the pre-change value.
    let mut features = Vec::with_capacity(feature_count);
    for pos in 0..feature_count {
        let mut observed: Vec<&str> = Vec::new();
        for (segments, _) in &parsed {
            let value = segments[2 + pos].as_str();
            if !observed.contains(&value) {
                observed.push(value);
            }
        }
        match observed.as_slice() {
            [pre, post] => features.push(FeatureDim::new(*pre, *post)),
            other => {
                return Err(SlowChangeError::validation(format!(
                    "scene '{scene_id}': feature position {} has {} distinct value(s), expected 2",
                    pos + 1,
                    other.len()
                )));
            }
        }
    }

    let mut stills = Vec::with_capacity(parsed.len());
    for (segments, name) in &parsed {
        let img = StillImage::load(&dir.join(name))?;
        stills.push(((segments[1].clone(), segments[2..].to_vec()), img));
    }

    Scene::new(
        scene_id,
        [colors.first.clone(), colors.second.clone()],
        features,
        stills,
    )
}
