//! Delaunay triangulation over a landmark set.
//!
//! Thin adapter around the `delaunator` crate: landmark X/Y positions go in, index triples come
//! out. Depth is ignored; the triangulation is purely 2D.

use delaunator::{triangulate, Point};

use crate::landmark::Landmarks;
use crate::mesh::Triangle;

/// Computes the Delaunay triangulation of the landmark set's X/Y positions.
///
/// Degenerate input (fewer than 3 points, or all points collinear) yields an empty triangle
/// list, never a panic or error; a diagnostic is logged so silently-empty meshes can be traced.
pub fn delaunay_triangles(landmarks: &Landmarks) -> Vec<Triangle> {
    if landmarks.len() < 3 {
        return Vec::new();
    }

    let points = landmarks
        .positions()
        .iter()
        .map(|&[x, y, _]| Point {
            x: f64::from(x),
            y: f64::from(y),
        })
        .collect::<Vec<_>>();

    let triangulation = triangulate(&points);
    if triangulation.triangles.is_empty() {
        log::debug!(
            "delaunay triangulation of {} points produced no triangles",
            points.len()
        );
        return Vec::new();
    }

    triangulation
        .triangles
        .chunks_exact(3)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect()
}
