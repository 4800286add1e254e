//! Face alignment via a 4-DOF similarity transform.
//!
//! Maps the five detected landmarks onto the ArcFace reference layout, scaled
//! to the embedding model's input size, and warps the face into a square crop.

use image::{Rgb, RgbImage};

/// ArcFace reference landmarks for a 112×112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

const REFERENCE_SIZE: f32 = 112.0;

/// Reference landmarks rescaled to a `size`×`size` crop.
pub fn reference_landmarks(size: u32) -> [(f32, f32); 5] {
    let s = size as f32 / REFERENCE_SIZE;
    REFERENCE_LANDMARKS_112.map(|(x, y)| (x * s, y * s))
}

/// `dst = [[a, -b], [b, a]] * src + [tx, ty]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityTransform {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl SimilarityTransform {
    /// Least-squares fit from `src` points to `dst` points.
    ///
    /// `None` when the source points are coincident.
    pub fn estimate(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Option<Self> {
        let n = src.len() as f32;
        let mean = |pts: &[(f32, f32); 5]| {
            let (sx, sy) = pts.iter().fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
            (sx / n, sy / n)
        };
        let (smx, smy) = mean(src);
        let (dmx, dmy) = mean(dst);

        // Centered sums: a = Σ(s·d)/Σ|s|², b = Σ(s×d)/Σ|s|²
        let (mut dot, mut cross, mut var) = (0.0f32, 0.0f32, 0.0f32);
        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
            let (sx, sy) = (sx - smx, sy - smy);
            let (dx, dy) = (dx - dmx, dy - dmy);
            dot += sx * dx + sy * dy;
            cross += sx * dy - sy * dx;
            var += sx * sx + sy * sy;
        }
        if var < 1e-12 {
            return None;
        }

        let a = dot / var;
        let b = cross / var;
        Some(Self {
            a,
            b,
            tx: dmx - (a * smx - b * smy),
            ty: dmy - (b * smx + a * smy),
        })
    }

    pub fn apply(&self, (x, y): (f32, f32)) -> (f32, f32) {
        (
            self.a * x - self.b * y + self.tx,
            self.b * x + self.a * y + self.ty,
        )
    }

    fn inverse_apply(&self, (x, y): (f32, f32)) -> Option<(f32, f32)> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let (dx, dy) = (x - self.tx, y - self.ty);
        Some(((self.a * dx + self.b * dy) / det, (-self.b * dx + self.a * dy) / det))
    }
}

/// Warp `rgb` through `transform` into a `size`×`size` image.
///
/// Bilinear sampling; pixels mapped from outside the source are black.
fn warp_similarity(rgb: &RgbImage, transform: &SimilarityTransform, size: u32) -> Option<RgbImage> {
    let (w, h) = (rgb.width() as i64, rgb.height() as i64);
    let sample = |x: i64, y: i64, c: usize| -> f32 {
        if x >= 0 && x < w && y >= 0 && y < h {
            rgb.get_pixel(x as u32, y as u32).0[c] as f32
        } else {
            0.0
        }
    };

    let mut out = RgbImage::new(size, size);
    for (ox, oy, pixel) in out.enumerate_pixels_mut() {
        let (sx, sy) = transform.inverse_apply((ox as f32, oy as f32))?;

        let x0 = sx.floor() as i64;
        let y0 = sy.floor() as i64;
        let fx = sx - x0 as f32;
        let fy = sy - y0 as f32;

        let mut rgb_out = [0u8; 3];
        for (c, channel) in rgb_out.iter_mut().enumerate() {
            let val = sample(x0, y0, c) * (1.0 - fx) * (1.0 - fy)
                + sample(x0 + 1, y0, c) * fx * (1.0 - fy)
                + sample(x0, y0 + 1, c) * (1.0 - fx) * fy
                + sample(x0 + 1, y0 + 1, c) * fx * fy;
            *channel = val.round().clamp(0.0, 255.0) as u8;
        }
        *pixel = Rgb(rgb_out);
    }

    Some(out)
}

/// Align a detected face to a canonical `size`×`size` crop.
///
/// `None` when the landmarks do not define a usable transform.
pub fn align_face(rgb: &RgbImage, landmarks: &[(f32, f32); 5], size: u32) -> Option<RgbImage> {
    let transform = SimilarityTransform::estimate(landmarks, &reference_landmarks(size))?;
    warp_similarity(rgb, &transform, size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let pts = REFERENCE_LANDMARKS_112;
        let t = SimilarityTransform::estimate(&pts, &pts).unwrap();
        assert!((t.a - 1.0).abs() < 1e-4, "a = {}", t.a);
        assert!(t.b.abs() < 1e-4, "b = {}", t.b);
        assert!(t.tx.abs() < 1e-3, "tx = {}", t.tx);
        assert!(t.ty.abs() < 1e-3, "ty = {}", t.ty);
    }

    #[test]
    fn test_scaled_transform() {
        // landmarks at 2x scale
        let src = REFERENCE_LANDMARKS_112.map(|(x, y)| (x * 2.0, y * 2.0));
        let t = SimilarityTransform::estimate(&src, &REFERENCE_LANDMARKS_112).unwrap();
        assert!((t.a - 0.5).abs() < 1e-4, "a = {}, expected 0.5", t.a);
        assert!(t.b.abs() < 1e-4);
    }

    #[test]
    fn test_rotation_recovered() {
        // 90° rotation about the origin plus a shift
        let src = REFERENCE_LANDMARKS_112;
        let dst = src.map(|(x, y)| (-y + 10.0, x + 5.0));
        let t = SimilarityTransform::estimate(&src, &dst).unwrap();
        assert!(t.a.abs() < 1e-4);
        assert!((t.b - 1.0).abs() < 1e-4);
        let (x, y) = t.apply(src[2]);
        assert!((x - dst[2].0).abs() < 1e-2 && (y - dst[2].1).abs() < 1e-2);
    }

    #[test]
    fn test_coincident_landmarks_rejected() {
        let src = [(50.0, 50.0); 5];
        assert!(SimilarityTransform::estimate(&src, &REFERENCE_LANDMARKS_112).is_none());
        let img = RgbImage::new(100, 100);
        assert!(align_face(&img, &src, 112).is_none());
    }

    #[test]
    fn test_reference_landmarks_scale_with_size() {
        let at_160 = reference_landmarks(160);
        assert!((at_160[0].0 - 38.2946 * 160.0 / 112.0).abs() < 1e-4);
        assert_eq!(reference_landmarks(112), REFERENCE_LANDMARKS_112);
    }

    #[test]
    fn test_align_face_output_size() {
        let img = RgbImage::from_pixel(640, 480, Rgb([128, 128, 128]));
        let aligned = align_face(&img, &REFERENCE_LANDMARKS_112, 160).unwrap();
        assert_eq!(aligned.dimensions(), (160, 160));
    }

    #[test]
    fn test_landmark_roundtrip() {
        // A bright patch at the left eye must land near the reference left eye.
        let mut img = RgbImage::new(200, 200);
        let src: [(f32, f32); 5] = [
            (80.0, 60.0),
            (120.0, 60.0),
            (100.0, 85.0),
            (85.0, 110.0),
            (115.0, 110.0),
        ];
        for dy in 0..5 {
            for dx in 0..5 {
                img.put_pixel(78 + dx, 58 + dy, Rgb([255, 200, 100]));
            }
        }

        let aligned = align_face(&img, &src, 112).unwrap();

        let ref_x = REFERENCE_LANDMARKS_112[0].0.round() as u32;
        let ref_y = REFERENCE_LANDMARKS_112[0].1.round() as u32;
        let mut max_red = 0u8;
        for y in ref_y - 1..=ref_y + 1 {
            for x in ref_x - 1..=ref_x + 1 {
                max_red = max_red.max(aligned.get_pixel(x, y).0[0]);
            }
        }
        assert!(max_red > 100, "expected bright patch near ({ref_x}, {ref_y}), max={max_red}");
    }
}
