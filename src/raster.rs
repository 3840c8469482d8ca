use std::path::Path;

use anyhow::Context as _;

use crate::error::{SlowChangeError, SlowChangeResult};

/// An immutable, tightly packed RGB8 raster (`data.len() == width * height * 3`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StillImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl StillImage {
    pub fn from_rgb8(width: u32, height: u32, data: Vec<u8>) -> SlowChangeResult<Self> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(SlowChangeError::validation(format!(
                "rgb8 buffer length {} does not match {}x{}x3",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn load(path: &Path) -> SlowChangeResult<Self> {
        let dyn_img =
            image::open(path).with_context(|| format!("decode still '{}'", path.display()))?;
        let rgb = dyn_img.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self {
            width,
            height,
            data: rgb.into_raw(),
        })
    }

    pub fn same_shape(&self, other: &StillImage) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// Linear interpolation between two equal-shape rasters; `weight` is the
/// fraction of `b` in the result. Per-channel math truncates to u8.
pub fn blend(a: &StillImage, b: &StillImage, weight: f64) -> SlowChangeResult<StillImage> {
    if !a.same_shape(b) {
        return Err(SlowChangeError::blend(format!(
            "dimension mismatch: {}x{} vs {}x{}",
            a.width, a.height, b.width, b.height
        )));
    }

    let weight = weight.clamp(0.0, 1.0);
    let inv = 1.0 - weight;
    let data = a
        .data
        .iter()
        .zip(&b.data)
        .map(|(&av, &bv)| (f64::from(av) * inv + f64::from(bv) * weight) as u8)
        .collect();

    Ok(StillImage {
        width: a.width,
        height: a.height,
        data,
    })
}

/// Grow each odd dimension by one pixel (duplicating the last row/column) so
/// the raster satisfies the encoder's even width/height requirement.
pub fn pad_to_even(img: &StillImage) -> StillImage {
    let width = img.width + img.width % 2;
    let height = img.height + img.height % 2;
    if width == img.width && height == img.height {
        return img.clone();
    }

    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        let src_y = y.min(img.height - 1) as usize;
        for x in 0..width {
            let src_x = x.min(img.width - 1) as usize;
            let at = (src_y * img.width as usize + src_x) * 3;
            data.extend_from_slice(&img.data[at..at + 3]);
        }
    }

    StillImage {
        width,
        height,
        data,
    }
}
