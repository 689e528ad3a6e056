use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::error::CrowdError;

/// An axis-aligned person box in frame pixel coordinates.
///
/// Construction validates `x1 <= x2`, `y1 <= y2` and finiteness, so every
/// value of this type is well-formed. Negative zero is normalized to zero,
/// which makes equality, hashing and ordering agree bit-for-bit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Result<Self, CrowdError> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(CrowdError::InvalidInput(format!(
                "non-finite box coordinates ({x1}, {y1}, {x2}, {y2})"
            )));
        }
        if x1 > x2 || y1 > y2 {
            return Err(CrowdError::InvalidInput(format!(
                "inverted box ({x1}, {y1}, {x2}, {y2}): expected x1 <= x2 and y1 <= y2"
            )));
        }
        Ok(Self {
            x1: x1 + 0.0,
            y1: y1 + 0.0,
            x2: x2 + 0.0,
            y2: y2 + 0.0,
        })
    }

    /// Clamps raw detector coordinates into a `width` x `height` frame.
    ///
    /// Returns `None` if the coordinates are non-finite or the box is
    /// inverted after clamping.
    pub fn clamped(x1: f64, y1: f64, x2: f64, y2: f64, width: u32, height: u32) -> Option<Self> {
        let w = width as f64;
        let h = height as f64;
        Self::new(
            x1.clamp(0.0, w),
            y1.clamp(0.0, h),
            x2.clamp(0.0, w),
            y2.clamp(0.0, h),
        )
        .ok()
    }

    /// Drops the fractional part of each coordinate, rounding toward zero.
    ///
    /// Detector output jitters below a pixel from frame to frame; whole-pixel
    /// boxes keep exact group keys stable across such drift.
    pub fn truncated(&self) -> Self {
        // trunc is monotone, so ordering and finiteness survive.
        Self {
            x1: self.x1.trunc() + 0.0,
            y1: self.y1.trunc() + 0.0,
            x2: self.x2.trunc() + 0.0,
            y2: self.y2.trunc() + 0.0,
        }
    }

    pub fn x1(&self) -> f64 {
        self.x1
    }

    pub fn y1(&self) -> f64 {
        self.y1
    }

    pub fn x2(&self) -> f64 {
        self.x2
    }

    pub fn y2(&self) -> f64 {
        self.y2
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Euclidean distance between the two box centers.
    pub fn center_distance(&self, other: &BoundingBox) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        (ax - bx).hypot(ay - by)
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        let area_a = self.width() * self.height();
        let area_b = other.width() * other.height();
        inter / (area_a + area_b - inter)
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = CrowdError;

    fn try_from(v: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        b.as_array()
    }
}

// Coordinates are finite and never negative zero, so float equality is a
// true equivalence relation here.
impl Eq for BoundingBox {}

impl Hash for BoundingBox {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for v in self.as_array() {
            v.to_bits().hash(state);
        }
    }
}

/// Lexicographic on `(x1, y1, x2, y2)`.
impl Ord for BoundingBox {
    fn cmp(&self, other: &Self) -> Ordering {
        self.x1
            .total_cmp(&other.x1)
            .then_with(|| self.y1.total_cmp(&other.y1))
            .then_with(|| self.x2.total_cmp(&other.x2))
            .then_with(|| self.y2.total_cmp(&other.y2))
    }
}

impl PartialOrd for BoundingBox {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::collections::HashSet;

    fn bbox(x1: f64, y1: f64, x2: f64, y2: f64) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2).unwrap()
    }

    // ── Validation ───────────────────────────────────────────────────

    #[rstest]
    #[case::inverted_x(20.0, 0.0, 10.0, 10.0)]
    #[case::inverted_y(0.0, 20.0, 10.0, 10.0)]
    #[case::nan(f64::NAN, 0.0, 10.0, 10.0)]
    #[case::infinite(0.0, 0.0, f64::INFINITY, 10.0)]
    #[case::negative_infinite(f64::NEG_INFINITY, 0.0, 10.0, 10.0)]
    fn test_malformed_box_is_rejected(
        #[case] x1: f64,
        #[case] y1: f64,
        #[case] x2: f64,
        #[case] y2: f64,
    ) {
        let result = BoundingBox::new(x1, y1, x2, y2);
        assert!(matches!(result, Err(CrowdError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_area_box_is_valid() {
        let b = bbox(5.0, 5.0, 5.0, 5.0);
        assert_relative_eq!(b.width(), 0.0);
        assert_relative_eq!(b.height(), 0.0);
    }

    #[test]
    fn test_negative_zero_is_normalized() {
        let a = bbox(-0.0, 0.0, 10.0, 10.0);
        let b = bbox(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a, b);
        assert_eq!(a.x1().to_bits(), 0.0f64.to_bits());
        let set: HashSet<BoundingBox> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    // ── Geometry ─────────────────────────────────────────────────────

    #[test]
    fn test_center() {
        let (cx, cy) = bbox(0.0, 0.0, 10.0, 20.0).center();
        assert_relative_eq!(cx, 5.0);
        assert_relative_eq!(cy, 10.0);
    }

    #[test]
    fn test_center_distance_diagonal() {
        // Centers (5,5) and (10,10)
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 5.0, 15.0, 15.0);
        assert_relative_eq!(a.center_distance(&b), 50.0f64.sqrt());
    }

    #[test]
    fn test_center_distance_is_symmetric() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(100.0, 40.0, 120.0, 90.0);
        assert_relative_eq!(a.center_distance(&b), b.center_distance(&a));
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = bbox(0.0, 0.0, 100.0, 100.0);
        let b = bbox(50.0, 0.0, 150.0, 100.0);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[test]
    fn test_iou_touching_edges() {
        let a = bbox(0.0, 0.0, 50.0, 50.0);
        let b = bbox(50.0, 0.0, 100.0, 50.0);
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    // ── Clamping ─────────────────────────────────────────────────────

    #[test]
    fn test_clamped_limits_to_frame() {
        let b = BoundingBox::clamped(-10.0, -5.0, 700.0, 500.0, 640, 480).unwrap();
        assert_eq!(b.as_array(), [0.0, 0.0, 640.0, 480.0]);
    }

    #[test]
    fn test_clamped_rejects_nan() {
        assert!(BoundingBox::clamped(f64::NAN, 0.0, 10.0, 10.0, 640, 480).is_none());
    }

    #[test]
    fn test_clamped_rejects_inverted() {
        assert!(BoundingBox::clamped(30.0, 0.0, 10.0, 10.0, 640, 480).is_none());
    }

    // ── Ordering ─────────────────────────────────────────────────────

    #[rstest]
    #[case::fractions_dropped([10.2, 20.9, 40.5, 90.99], [10.0, 20.0, 40.0, 90.0])]
    #[case::whole_pixels_unchanged([3.0, 4.0, 5.0, 6.0], [3.0, 4.0, 5.0, 6.0])]
    #[case::negative_toward_zero([-1.7, -0.4, 2.3, 3.0], [-1.0, 0.0, 2.0, 3.0])]
    fn test_truncated_rounds_toward_zero(#[case] raw: [f64; 4], #[case] expected: [f64; 4]) {
        let b = bbox(raw[0], raw[1], raw[2], raw[3]).truncated();
        assert_eq!(b.as_array(), expected);
    }

    #[test]
    fn test_truncated_negative_fraction_is_positive_zero() {
        let b = bbox(-0.4, 0.0, 1.0, 1.0).truncated();
        assert!(b.x1().is_sign_positive());
        assert_eq!(b, bbox(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_truncated_keeps_narrow_box_valid() {
        let b = bbox(5.2, 5.1, 5.8, 5.9).truncated();
        assert_eq!(b.as_array(), [5.0, 5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut boxes = vec![
            bbox(5.0, 0.0, 10.0, 10.0),
            bbox(1.0, 9.0, 10.0, 10.0),
            bbox(1.0, 2.0, 10.0, 12.0),
            bbox(1.0, 2.0, 10.0, 11.0),
        ];
        boxes.sort();
        assert_eq!(boxes[0].as_array(), [1.0, 2.0, 10.0, 11.0]);
        assert_eq!(boxes[1].as_array(), [1.0, 2.0, 10.0, 12.0]);
        assert_eq!(boxes[2].as_array(), [1.0, 9.0, 10.0, 10.0]);
        assert_eq!(boxes[3].as_array(), [5.0, 0.0, 10.0, 10.0]);
    }

    // ── Serde ────────────────────────────────────────────────────────

    #[test]
    fn test_deserialize_from_array() {
        let b: BoundingBox = serde_json::from_str("[1.0, 2.0, 3.0, 4.0]").unwrap();
        assert_eq!(b, bbox(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn test_deserialize_rejects_inverted_box() {
        let result: Result<BoundingBox, _> = serde_json::from_str("[10.0, 0.0, 3.0, 4.0]");
        assert!(result.is_err());
    }
}
