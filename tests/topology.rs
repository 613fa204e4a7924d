//! Consistency checks over the static topology tables.
//!
//! The tables are hand-maintained; these tests make sure an edit cannot silently introduce an
//! index outside the canonical landmark range or break the structural assumptions the rest of
//! the crate relies on.

use std::collections::HashSet;

use omote::topology::{
    region_landmark_lists, ContourKind, CANONICAL_LANDMARKS, CENTROID_QUADS, CONTOURS,
    DENSE_EDGES, FACE_OVAL, SYMMETRY_PAIRS,
};

#[test]
fn region_tables_reference_canonical_landmarks() {
    for (region, landmarks) in region_landmark_lists() {
        assert!(!landmarks.is_empty(), "{region:?} has no landmarks");
        for &idx in landmarks {
            assert!(
                idx < CANONICAL_LANDMARKS,
                "{region:?} references landmark {idx}"
            );
        }
    }
}

#[test]
fn symmetry_pairs_are_canonical_and_unique() {
    let mut lefts = HashSet::new();
    let mut rights = HashSet::new();
    for &(left, right) in SYMMETRY_PAIRS {
        assert!(left < CANONICAL_LANDMARKS && right < CANONICAL_LANDMARKS);
        assert_ne!(left, right);
        assert!(lefts.insert(left), "duplicate left index {left}");
        assert!(rights.insert(right), "duplicate right index {right}");
    }
    assert!(
        lefts.is_disjoint(&rights),
        "an index appears on both sides of the symmetry table"
    );
}

#[test]
fn dense_edges_are_canonical() {
    for &(idx1, idx2, num_points) in DENSE_EDGES {
        assert!(idx1 < CANONICAL_LANDMARKS && idx2 < CANONICAL_LANDMARKS);
        assert_ne!(idx1, idx2);
        assert!(num_points >= 1);
    }
    for quad in CENTROID_QUADS {
        for &idx in quad {
            assert!(idx < CANONICAL_LANDMARKS);
        }
    }
}

#[test]
fn face_oval_is_a_36_point_loop_of_unique_landmarks() {
    assert_eq!(FACE_OVAL.len(), 36);
    let unique = FACE_OVAL.iter().collect::<HashSet<_>>();
    assert_eq!(unique.len(), FACE_OVAL.len());
    for &idx in FACE_OVAL {
        assert!(idx < CANONICAL_LANDMARKS);
    }
}

#[test]
fn contours_reference_canonical_landmarks() {
    for &(kind, indices) in CONTOURS {
        assert!(indices.len() >= 2, "{kind:?} is not a polyline");
        for &idx in indices {
            assert!(idx < CANONICAL_LANDMARKS, "{kind:?} references {idx}");
        }
    }
}

#[test]
fn face_oval_contour_closes_on_the_oval_table() {
    let oval_contour = CONTOURS
        .iter()
        .find(|&&(kind, _)| kind == ContourKind::FaceOval)
        .map(|&(_, indices)| indices)
        .unwrap();
    assert_eq!(oval_contour.first(), oval_contour.last());
    assert_eq!(&oval_contour[..oval_contour.len() - 1], FACE_OVAL);
}
