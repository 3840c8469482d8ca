use rand::{seq::SliceRandom, Rng};

use crate::{config::Timing, scene::Scene};

/// Randomized per-scene plan: playback color direction, the order in which
/// feature changes occur, and the onset frame of each change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulePlan {
    pub start_color: String,
    pub end_color: String,
    /// Permutation of the scene's feature-dimension indices; position i in
    /// this list owns the i-th onset time section.
    pub order: Vec<usize>,
    /// Onset frame per permuted position, parallel to `order`.
    pub onsets: Vec<u64>,
}

/// Draw a plan for one scene. The i-th change (0-indexed, after permutation)
/// is allotted the `[i/N, (i+1)/N]` slice of the sequence, and its onset is
/// sampled uniformly from the central `active_window_fraction` of that slice.
/// The excluded margins guarantee adjacent changes cannot overlap at a
/// section boundary.
pub fn plan_scene<R: Rng + ?Sized>(scene: &Scene, timing: &Timing, rng: &mut R) -> SchedulePlan {
    let [first, second] = &scene.colors;
    let (start_color, end_color) = if rng.random_bool(0.5) {
        (first.clone(), second.clone())
    } else {
        (second.clone(), first.clone())
    };

    let mut order: Vec<usize> = (0..scene.feature_count()).collect();
    order.shuffle(rng);

    let n = order.len();
    let onsets = (0..n)
        .map(|i| {
            let section = 1.0 / n as f64;
            let margin = section * (1.0 - timing.active_window_fraction) / 2.0;
            let p = i as f64 * section
                + margin
                + section * timing.active_window_fraction * rng.random_range(0.0..1.0);
            (p * (timing.total_frames + 1) as f64).floor() as u64
        })
        .collect();

    SchedulePlan {
        start_color,
        end_color,
        order,
        onsets,
    }
}
