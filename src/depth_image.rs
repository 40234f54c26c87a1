use glam::Vec3;

/// Depth attachment copied back to the CPU, row-major from the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl DepthImage {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get((y * self.width + x) as usize).copied()
    }

    /// Smallest and largest finite depth.
    pub fn range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|d| d.is_finite())
            .fold(None, |acc, d| match acc {
                None => Some((d, d)),
                Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
            })
    }

    /// Depth rescaled to `[0, 1]` over its own range; a constant image maps to 0.
    pub fn normalized(&self) -> Vec<f32> {
        let Some((lo, hi)) = self.range() else {
            return vec![0.0; self.data.len()];
        };
        let span = hi - lo;
        self.data
            .iter()
            .map(|&d| {
                if !d.is_finite() || span <= f32::EPSILON {
                    0.0
                } else {
                    ((d - lo) / span).clamp(0.0, 1.0)
                }
            })
            .collect()
    }

    /// Colour mapped RGBA8 pixels for display.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.normalized()
            .into_iter()
            .flat_map(|t| {
                let c = viridis(t) * 255.0;
                [c.x.round() as u8, c.y.round() as u8, c.z.round() as u8, 255]
            })
            .collect()
    }
}

const VIRIDIS: [[f32; 3]; 9] = [
    [0.267, 0.005, 0.329],
    [0.283, 0.141, 0.458],
    [0.254, 0.265, 0.530],
    [0.207, 0.372, 0.553],
    [0.164, 0.471, 0.558],
    [0.128, 0.567, 0.551],
    [0.135, 0.659, 0.518],
    [0.267, 0.749, 0.441],
    [0.993, 0.906, 0.144],
];

/// Piecewise linear viridis, `t` in `[0, 1]`.
pub fn viridis(t: f32) -> Vec3 {
    let t = t.clamp(0.0, 1.0) * (VIRIDIS.len() - 1) as f32;
    let i = (t.floor() as usize).min(VIRIDIS.len() - 2);
    let f = t - i as f32;
    Vec3::from_array(VIRIDIS[i]).lerp(Vec3::from_array(VIRIDIS[i + 1]), f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_over_finite_range() {
        let image = DepthImage::new(2, 2, vec![0.5, 1.0, 0.75, f32::NAN]);
        assert_eq!(image.range(), Some((0.5, 1.0)));
        assert_eq!(image.normalized(), vec![0.0, 1.0, 0.5, 0.0]);
        assert_eq!(image.get(1, 1).map(f32::is_nan), Some(true));
        assert_eq!(image.get(2, 0), None);
    }

    #[test]
    fn constant_image_is_flat() {
        let image = DepthImage::new(3, 1, vec![1.0; 3]);
        assert_eq!(image.normalized(), vec![0.0; 3]);
    }

    #[test]
    fn rgba_has_four_bytes_per_pixel_and_opaque_alpha() {
        let image = DepthImage::new(2, 1, vec![0.0, 1.0]);
        let rgba = image.to_rgba8();
        assert_eq!(rgba.len(), 8);
        assert_eq!(rgba[3], 255);
        assert_eq!(&rgba[4..7], &[253, 231, 37]);
    }

    #[test]
    fn viridis_endpoints() {
        assert!(viridis(0.0).abs_diff_eq(Vec3::new(0.267, 0.005, 0.329), 1e-6));
        assert!(viridis(2.0).abs_diff_eq(Vec3::new(0.993, 0.906, 0.144), 1e-6));
    }
}
