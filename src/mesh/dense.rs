//! Dense landmark synthesis.
//!
//! The canonical face topology is sparse in the cheek, forehead and jaw areas. This module
//! fills those areas in by interpolating extra points along the edges listed in
//! [`topology::DENSE_EDGES`] and appending centroids for the quads in
//! [`topology::CENTROID_QUADS`], growing a 468-point set to 550+ points.
//!
//! [`topology::DENSE_EDGES`]: crate::topology::DENSE_EDGES
//! [`topology::CENTROID_QUADS`]: crate::topology::CENTROID_QUADS

use crate::landmark::{Landmark, Landmarks};
use crate::num::lerp;
use crate::topology::{CANONICAL_LANDMARKS, CENTROID_QUADS, DENSE_EDGES};

/// Appends synthesized landmarks to `landmarks` and returns how many points were added.
///
/// Interpolated edge points come first, in table order, followed by the quad centroids, so the
/// synthesized indices are stable for identical inputs. Table entries referencing indices that
/// are out of range for `landmarks` are skipped silently. Landmark sets shorter than the
/// canonical topology are left untouched.
pub fn synthesize_dense_landmarks(landmarks: &mut Landmarks) -> usize {
    if landmarks.len() < CANONICAL_LANDMARKS {
        return 0;
    }

    let base_len = landmarks.len();

    for &(idx1, idx2, num_points) in DENSE_EDGES {
        if idx1 >= base_len || idx2 >= base_len {
            continue;
        }

        let p1 = landmarks.get(idx1).position();
        let p2 = landmarks.get(idx2).position();
        for i in 1..=num_points {
            let t = i as f32 / (num_points + 1) as f32;
            landmarks.push(Landmark::new([
                lerp(p1[0], p2[0], t),
                lerp(p1[1], p2[1], t),
                lerp(p1[2], p2[2], t),
            ]));
        }
    }

    for quad in CENTROID_QUADS {
        if quad.iter().any(|&idx| idx >= base_len) {
            continue;
        }

        let mut centroid = [0.0; 3];
        for &idx in quad {
            let pos = landmarks.get(idx).position();
            for (acc, coord) in centroid.iter_mut().zip(pos) {
                *acc += coord / 4.0;
            }
        }
        landmarks.push(Landmark::new(centroid));
    }

    let added = landmarks.len() - base_len;
    log::debug!("dense landmarks: {} -> {} points", base_len, landmarks.len());
    added
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    /// Expected number of synthesized points for a full canonical landmark set.
    fn expected_count() -> usize {
        DENSE_EDGES.iter().map(|&(_, _, n)| n).sum::<usize>() + CENTROID_QUADS.len()
    }

    #[test]
    fn synthesized_count_matches_tables() {
        let mut lms = crate::test::synthetic_face();
        let added = synthesize_dense_landmarks(&mut lms);
        assert_eq!(added, expected_count());
        assert_eq!(lms.len(), CANONICAL_LANDMARKS + expected_count());
    }

    #[test]
    fn short_sets_are_untouched() {
        let mut lms = Landmarks::new(100);
        assert_eq!(synthesize_dense_landmarks(&mut lms), 0);
        assert_eq!(lms.len(), 100);
    }

    #[test]
    fn interpolated_points_lie_on_their_edge() {
        let mut lms = crate::test::synthetic_face();
        synthesize_dense_landmarks(&mut lms);

        // The first table entry creates 2 points between landmarks 116 and 123 at t = 1/3, 2/3.
        let p1 = lms.get(116).position();
        let p2 = lms.get(123).position();
        for (offset, t) in [(0, 1.0 / 3.0), (1, 2.0 / 3.0)] {
            let p = lms.get(CANONICAL_LANDMARKS + offset).position();
            for axis in 0..3 {
                assert_relative_eq!(p[axis], lerp(p1[axis], p2[axis], t), epsilon = 1e-6);
            }
        }
    }
}
