use crate::{
    config::Timing,
    encode::FrameSink,
    error::{SlowChangeError, SlowChangeResult},
    raster::{blend, pad_to_even, StillImage},
    scene::Scene,
    schedule::SchedulePlan,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameIndex(pub u64);

/// Synthesize the full frame sequence for one scene and push it into `sink`
/// in strictly increasing index order (`0..=total_frames`).
///
/// Per frame the result is a fold: the slow color blend of the
/// all-pre-change stills seeds the frame, then each feature in permuted
/// order either leaves it alone (change not started), eases it toward its
/// swapped counterpart (mid-transition), or re-selects it as the fully
/// post-change version. Because onset sections are disjoint and ordered,
/// completed changes are always folded in before the (at most one)
/// mid-transition change, so its ease correctly includes them.
///
/// Transition windows are deliberately not clamped to the sequence bounds;
/// an onset near frame 0 or `total_frames` yields a partially visible ease.
/// The window endpoints are only ever compared against the frame index, so
/// nothing is read out of range.
pub fn synthesize(
    scene: &Scene,
    plan: &SchedulePlan,
    timing: &Timing,
    sink: &mut dyn FrameSink,
) -> SlowChangeResult<()> {
    if timing.total_frames == 0 {
        // A zero-length morph would make every color weight 0/0.
        return Err(SlowChangeError::validation(
            "total_frames must be non-zero",
        ));
    }
    let total = timing.total_frames;
    let half = (timing.quick_window_frames / 2) as i64;
    let step = 1.0 / (timing.quick_window_frames as f64 + 1.0);

    for k in 0..=total {
        let color_weight = k as f64 / total as f64;
        let mut values = scene.initial_values();
        let mut frame = color_morph(scene, plan, &values, color_weight)?;

        for (slot, &dim) in plan.order.iter().enumerate() {
            let onset = plan.onsets[slot] as i64;
            let idx = k as i64;

            if idx < onset - half {
                continue;
            }
            if idx < onset + half {
                // Mid-transition: ease the frame as composed so far toward
                // the same frame with this feature's value swapped. `count`
                // runs from `quick_window_frames` down to 1 across the
                // window, so the weight toward post-change rises each frame.
                let mut swapped = values.clone();
                swapped[dim] = scene.features[dim].post().to_string();
                let target = color_morph(scene, plan, &swapped, color_weight)?;
                let count = (onset + half - idx) as f64;
                frame = blend(&frame, &target, 1.0 - step * count)?;
            } else {
                values[dim] = scene.features[dim].post().to_string();
                frame = color_morph(scene, plan, &values, color_weight)?;
            }
        }

        sink.push_frame(FrameIndex(k), &pad_to_even(&frame))?;
    }

    Ok(())
}

/// Step A for one feature-state vector: blend the start-color and end-color
/// stills carrying `values`, with `weight` the fraction of the end color.
fn color_morph(
    scene: &Scene,
    plan: &SchedulePlan,
    values: &[String],
    weight: f64,
) -> SlowChangeResult<StillImage> {
    let a = scene.still(&plan.start_color, values)?;
    let b = scene.still(&plan.end_color, values)?;
    blend(a, b, weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        encode::{InMemorySink, SinkConfig},
        scene::{FeatureDim, Scene},
    };

    fn solid(value: u8) -> StillImage {
        StillImage::from_rgb8(2, 2, vec![value; 12]).unwrap()
    }

    fn timing(total_frames: u64, quick_window_frames: u64) -> Timing {
        Timing {
            total_frames,
            quick_window_frames,
            active_window_fraction: 0.75,
        }
    }

    fn begun_sink() -> InMemorySink {
        let mut sink = InMemorySink::new();
        sink.begin(SinkConfig {
            width: 2,
            height: 2,
            fps: 12,
            hold_frames: 0,
        })
        .unwrap();
        sink
    }

    /// Two colors, no features: black morphs to white.
    fn featureless_scene() -> Scene {
        let stills = vec![
            (("Dark".to_string(), vec![]), solid(0)),
            (("Light".to_string(), vec![]), solid(255)),
        ];
        Scene::new(
            "S",
            ["Dark".to_string(), "Light".to_string()],
            vec![],
            stills,
        )
        .unwrap()
    }

    /// One feature; both colors share the same pixels so only the feature
    /// transition moves channel values (pre = black, post = white).
    fn single_feature_scene() -> Scene {
        let mut stills = Vec::new();
        for color in ["A", "B"] {
            stills.push(((color.to_string(), vec!["off".to_string()]), solid(0)));
            stills.push(((color.to_string(), vec!["on".to_string()]), solid(255)));
        }
        Scene::new(
            "S",
            ["A".to_string(), "B".to_string()],
            vec![FeatureDim::new("off", "on")],
            stills,
        )
        .unwrap()
    }

    #[test]
    fn zero_features_is_a_pure_color_morph() {
        let scene = featureless_scene();
        let plan = SchedulePlan {
            start_color: "Dark".to_string(),
            end_color: "Light".to_string(),
            order: vec![],
            onsets: vec![],
        };
        let mut sink = begun_sink();
        synthesize(&scene, &plan, &timing(8, 4), &mut sink).unwrap();

        let frames = sink.frames();
        assert_eq!(frames.len(), 9);
        for (i, (idx, frame)) in frames.iter().enumerate() {
            assert_eq!(*idx, FrameIndex(i as u64));
            let expected = (255.0 * i as f64 / 8.0) as u8;
            assert!(frame.data.iter().all(|&v| v == expected));
        }
    }

    #[test]
    fn single_feature_partitions_into_pre_blend_post() {
        let scene = single_feature_scene();
        let plan = SchedulePlan {
            start_color: "A".to_string(),
            end_color: "B".to_string(),
            order: vec![0],
            onsets: vec![8],
        };
        // window 4 => half 2, step 1/5: transition spans frames 6..10.
        let mut sink = begun_sink();
        synthesize(&scene, &plan, &timing(16, 4), &mut sink).unwrap();

        let frames = sink.frames();
        assert_eq!(frames.len(), 17);
        let step = 1.0 / 5.0;
        for (idx, frame) in frames {
            let v = frame.data[0];
            match idx.0 {
                k if k < 6 => assert_eq!(v, 0, "frame {k} should be pre-change"),
                k if k < 10 => {
                    let count = (10 - k) as f64;
                    let expected = (255.0 * (1.0 - step * count)) as u8;
                    assert_eq!(v, expected, "frame {k} blend weight");
                    assert!(v > 0 && v < 255);
                }
                k => assert_eq!(v, 255, "frame {k} should be post-change"),
            }
        }
    }

    #[test]
    fn blend_weight_is_monotonic_across_the_window() {
        let scene = single_feature_scene();
        let plan = SchedulePlan {
            start_color: "A".to_string(),
            end_color: "B".to_string(),
            order: vec![0],
            onsets: vec![24],
        };
        let mut sink = begun_sink();
        synthesize(&scene, &plan, &timing(48, 12), &mut sink).unwrap();

        let values: Vec<u8> = sink.frames().iter().map(|(_, f)| f.data[0]).collect();
        for pair in values.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert_eq!(values[0], 0);
        assert_eq!(*values.last().unwrap(), 255);
    }

    #[test]
    fn onset_near_the_start_is_tolerated_without_clamping() {
        let scene = single_feature_scene();
        let plan = SchedulePlan {
            start_color: "A".to_string(),
            end_color: "B".to_string(),
            order: vec![0],
            onsets: vec![0],
        };
        // half = 2, so the window [-2, 2) is partially before frame 0.
        let mut sink = begun_sink();
        synthesize(&scene, &plan, &timing(16, 4), &mut sink).unwrap();

        let frames = sink.frames();
        assert_eq!(frames.len(), 17);
        // Frame 0 lands mid-transition; frame 2 onward is fully post-change.
        assert!(frames[0].1.data[0] > 0);
        assert_eq!(frames[2].1.data[0], 255);
    }

    #[test]
    fn zero_total_frames_is_rejected_before_any_frame() {
        let scene = featureless_scene();
        let plan = SchedulePlan {
            start_color: "Dark".to_string(),
            end_color: "Light".to_string(),
            order: vec![],
            onsets: vec![],
        };
        let mut sink = begun_sink();
        let err = synthesize(&scene, &plan, &timing(0, 1), &mut sink).unwrap_err();
        assert!(matches!(err, SlowChangeError::Validation(_)));
        assert!(sink.frames().is_empty());
    }

    #[test]
    fn frames_with_odd_stills_are_padded_even() {
        let odd = StillImage::from_rgb8(3, 3, vec![7; 27]).unwrap();
        let bright = StillImage::from_rgb8(3, 3, vec![250; 27]).unwrap();
        let stills = vec![
            (("A".to_string(), vec![]), odd),
            (("B".to_string(), vec![]), bright),
        ];
        let scene = Scene::new("S", ["A".to_string(), "B".to_string()], vec![], stills).unwrap();
        let plan = SchedulePlan {
            start_color: "A".to_string(),
            end_color: "B".to_string(),
            order: vec![],
            onsets: vec![],
        };
        let mut sink = begun_sink();
        synthesize(&scene, &plan, &timing(4, 2), &mut sink).unwrap();
        for (_, frame) in sink.frames() {
            assert_eq!((frame.width, frame.height), (4, 4));
        }
    }
}
