use serde::{Deserialize, Serialize};

use crate::mask::Mask;

/// Best integer translation of the left reflection onto the right one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub dx: isize,
    pub dy: isize,
    /// Pixels set in both masks at this shift.
    pub overlap: usize,
    pub iou: f64,
}

impl Alignment {
    fn beats(&self, other: &Alignment) -> bool {
        if self.overlap != other.overlap {
            return self.overlap > other.overlap;
        }
        if self.iou != other.iou {
            return self.iou > other.iou;
        }
        self.dx.abs() + self.dy.abs() < other.dx.abs() + other.dy.abs()
    }
}

fn overlap_and_union(left: &Mask, right: &Mask, dx: isize, dy: isize) -> (usize, usize) {
    let (mut both, mut either) = (0, 0);
    for y in 0..right.height {
        for x in 0..right.width {
            let l = left.get_signed(x as isize - dx, y as isize - dy);
            let r = right.get(x, y);
            if l && r {
                both += 1;
            }
            if l || r {
                either += 1;
            }
        }
    }
    (both, either)
}

/// Search shifts `dx ∈ [-W/5, W/5]`, `dy ∈ [-H/6, H/6]` of `left` over
/// `right` on a common canvas. Maximum overlap wins; ties go to the higher
/// IOU, then the smaller shift.
pub fn best_alignment(left: &Mask, right: &Mask) -> Alignment {
    let width = left.width.max(right.width);
    let height = left.height.max(right.height);
    let left = left.padded(width, height);
    let right = right.padded(width, height);

    let max_dx = (width / 5) as isize;
    let max_dy = (height / 6) as isize;

    let mut best: Option<Alignment> = None;
    for dy in -max_dy..=max_dy {
        for dx in -max_dx..=max_dx {
            let (overlap, union) = overlap_and_union(&left, &right, dx, dy);
            let iou = if union == 0 {
                0.0
            } else {
                overlap as f64 / union as f64
            };
            let candidate = Alignment {
                dx,
                dy,
                overlap,
                iou,
            };
            if best.as_ref().is_none_or(|b| candidate.beats(b)) {
                best = Some(candidate);
            }
        }
    }
    // The search range always contains (0, 0).
    best.unwrap_or(Alignment {
        dx: 0,
        dy: 0,
        overlap: 0,
        iou: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn blob(w: usize, h: usize, x0: usize, y0: usize, size: usize) -> Mask {
        Mask::from_fn(w, h, |x, y| {
            (x0..x0 + size).contains(&x) && (y0..y0 + size).contains(&y)
        })
    }

    #[test]
    fn test_recovers_known_shift() {
        let left = blob(30, 24, 10, 10, 4);
        let right = blob(30, 24, 13, 12, 4);
        let a = best_alignment(&left, &right);
        assert_eq!((a.dx, a.dy), (3, 2));
        assert_eq!(a.overlap, 16);
        assert_eq!(a.iou, 1.0);
    }

    #[test]
    fn test_shift_outside_range_is_partial() {
        // W/5 = 4, so a shift of 6 cannot be fully recovered.
        let left = blob(20, 12, 2, 4, 4);
        let right = blob(20, 12, 8, 4, 4);
        let a = best_alignment(&left, &right);
        assert_eq!((a.dx, a.dy), (4, 0));
        assert_eq!(a.overlap, 8);
    }

    #[test]
    fn test_disjoint_masks_prefer_zero_shift() {
        let left = blob(20, 12, 0, 0, 2);
        let right = blob(20, 12, 16, 8, 2);
        let a = best_alignment(&left, &right);
        assert_eq!((a.dx, a.dy, a.overlap), (0, 0, 0));
        assert_eq!(a.iou, 0.0);
    }

    #[test]
    fn test_different_sizes_are_padded() {
        let left = blob(10, 6, 2, 2, 3);
        let right = blob(14, 9, 2, 2, 3);
        let a = best_alignment(&left, &right);
        assert_eq!((a.dx, a.dy, a.iou), (0, 0, 1.0));
    }

    proptest! {
        #[test]
        fn prop_identical_masks_align_at_origin(
            w in 4usize..24,
            h in 4usize..24,
            seed in proptest::collection::vec(any::<bool>(), 24 * 24),
        ) {
            let mask = Mask::from_fn(w, h, |x, y| seed[y * 24 + x]);
            prop_assume!(!mask.is_empty());
            let a = best_alignment(&mask, &mask);
            prop_assert_eq!((a.dx, a.dy), (0, 0));
            prop_assert_eq!(a.overlap, mask.count());
            prop_assert_eq!(a.iou, 1.0);
        }
    }
}
