//! Adaptive face mesh generation.
//!
//! [`AdaptiveMesher`] turns a landmark set into a triangle mesh whose density follows the
//! detail rank of each facial region: eyes, lips and nose keep every triangle, while cheeks and
//! forehead are pruned as the level of detail drops and subdivided when they are too coarse.
//!
//! The pipeline is: optional bilateral symmetry enforcement, optional dense landmark synthesis,
//! Delaunay triangulation, boundary/edge/area filtering, optional flat-region subdivision. The
//! most recent result is memoized in a single slot keyed by a cheap positional hash, so feeding
//! the same frame twice is free.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::geom::{edge_length, point_in_polygon, triangle_area};
use crate::landmark::{Landmark, Landmarks};
use crate::num::TotalF32;
use crate::topology::{classify_landmark, DetailTier, FACE_OVAL, SYMMETRY_PAIRS};

pub mod delaunay;
pub mod dense;

/// A mesh face as an ordered triple of landmark indices.
pub type Triangle = [usize; 3];

/// Landmark indices sampled by the memoization hash.
const HASH_SAMPLE_INDICES: [usize; 8] = [0, 33, 133, 263, 362, 1, 168, 6];

/// Fraction by which the face boundary is grown before containment tests, so landmarks sitting
/// exactly on the oval survive filtering.
const BOUNDARY_EXPANSION: f32 = 0.01;

/// Percentile of the edge-length distribution used to derive the max-edge cutoff, and the
/// margin applied on top of it. Both are empirically tuned.
const EDGE_LENGTH_PERCENTILE: f32 = 0.80;
const EDGE_LENGTH_MARGIN: f32 = 1.2;

/// Scale factor of the LOD-dependent minimum-area threshold. Empirically tuned.
const LOD_AREA_FACTOR: f32 = 0.05;

/// Normalized area above which flat-region triangles are subdivided, and the LOD level that
/// must be exceeded for subdivision to run at all. Both are empirically tuned.
const FLAT_SUBDIVISION_AREA: f32 = 0.002;
const FLAT_SUBDIVISION_MIN_LOD: f32 = 0.5;

/// LOD level that must be exceeded for the optional high-detail subdivision pass.
const HIGH_DETAIL_SUBDIVISION_MIN_LOD: f32 = 0.7;

/// Tuning knobs of the [`AdaptiveMesher`].
///
/// Mutating settings through [`AdaptiveMesher::set_settings`] invalidates the cached mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct MesherSettings {
    /// Mirror-average bilaterally symmetric landmark pairs before triangulating.
    pub enable_symmetry: bool,
    /// Detail multipliers per region tier. Values closer to 1.0 preserve more triangles as the
    /// LOD level drops.
    pub high_detail_multiplier: f32,
    pub medium_detail_multiplier: f32,
    pub low_detail_multiplier: f32,
    /// Reserved absolute area bounds for mesh triangles (normalized units).
    pub min_triangle_area: f32,
    pub max_triangle_area: f32,
}

impl Default for MesherSettings {
    fn default() -> Self {
        Self {
            enable_symmetry: true,
            high_detail_multiplier: 1.0,
            medium_detail_multiplier: 0.7,
            low_detail_multiplier: 0.4,
            min_triangle_area: 1e-5,
            max_triangle_area: 0.01,
        }
    }
}

/// Statistics describing how a [`Mesh`] was produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshStats {
    /// Landmark count of the caller-supplied set.
    pub original_landmarks: usize,
    /// Landmark count after dense synthesis (before subdivision).
    pub dense_landmarks: usize,
    /// Number of points added by dense synthesis.
    pub synthesized_points: usize,
    /// Number of triangles in the final mesh.
    pub triangle_count: usize,
    /// LOD level the mesh was generated at.
    pub lod_level: f32,
}

/// An adaptive triangle mesh over a (possibly extended) landmark set.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    triangles: Vec<Triangle>,
    landmarks: Landmarks,
    stats: MeshStats,
}

impl Mesh {
    #[inline]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// The landmark set the triangle indices refer to: the input landmarks (symmetrized if
    /// enabled) followed by any synthesized and subdivision points.
    #[inline]
    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    #[inline]
    pub fn stats(&self) -> &MeshStats {
        &self.stats
    }

    /// Returns the triangle indices as a flat stream, 3 entries per triangle, for handing to
    /// index-buffer style consumers.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.triangles.iter().flatten().copied()
    }
}

/// Overwrites each configured symmetry pair with positions mirrored around the vertical center
/// line at x = 0.5.
///
/// Y and Z become the pair's average; the X positions are recomputed as
/// `0.5 ± average distance from center`. Pairs referencing out-of-range indices are skipped.
pub fn enforce_symmetry(landmarks: &mut Landmarks) {
    const CENTER_X: f32 = 0.5;

    for &(left, right) in SYMMETRY_PAIRS {
        if left >= landmarks.len() || right >= landmarks.len() {
            continue;
        }

        let l = landmarks.get(left).position();
        let r = landmarks.get(right).position();

        let avg_y = (l[1] + r[1]) / 2.0;
        let avg_z = (l[2] + r[2]) / 2.0;
        let avg_dist = ((l[0] - CENTER_X).abs() + (r[0] - CENTER_X).abs()) / 2.0;

        landmarks.set(left, Landmark::new([CENTER_X - avg_dist, avg_y, avg_z]));
        landmarks.set(right, Landmark::new([CENTER_X + avg_dist, avg_y, avg_z]));
    }
}

/// Builds the face boundary polygon from the oval landmarks of `landmarks`.
///
/// Out-of-range oval indices are skipped, so a partial landmark set yields a partial (possibly
/// degenerate) boundary rather than a panic.
pub fn face_boundary(landmarks: &Landmarks) -> Vec<[f32; 2]> {
    FACE_OVAL
        .iter()
        .filter(|&&idx| idx < landmarks.len())
        .map(|&idx| landmarks.get(idx).xy())
        .collect()
}

/// Expands a boundary polygon outward from its centroid by the given relative amount.
pub fn expand_boundary(boundary: &[[f32; 2]], amount: f32) -> Vec<[f32; 2]> {
    if boundary.len() < 3 {
        return boundary.to_vec();
    }

    let mut cx = 0.0;
    let mut cy = 0.0;
    for p in boundary {
        cx += p[0];
        cy += p[1];
    }
    cx /= boundary.len() as f32;
    cy /= boundary.len() as f32;

    boundary
        .iter()
        .map(|p| {
            [
                cx + (p[0] - cx) * (1.0 + amount),
                cy + (p[1] - cy) * (1.0 + amount),
            ]
        })
        .collect()
}

struct CacheSlot {
    key: u64,
    mesh: Mesh,
}

/// Region-aware adaptive mesh generator with a single-slot result cache.
///
/// The cache is owned exclusively by one mesher instance; sharing an instance across threads
/// requires external synchronization.
pub struct AdaptiveMesher {
    lod_level: f32,
    enable_dense_landmarks: bool,
    enable_subdivision: bool,
    settings: MesherSettings,
    cache: Option<CacheSlot>,
    recomputations: u64,
}

impl Default for AdaptiveMesher {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveMesher {
    pub fn new() -> Self {
        Self {
            lod_level: 1.0,
            enable_dense_landmarks: true,
            enable_subdivision: true,
            settings: MesherSettings::default(),
            cache: None,
            recomputations: 0,
        }
    }

    #[inline]
    pub fn lod_level(&self) -> f32 {
        self.lod_level
    }

    /// Sets the level of detail, clamped to `0.0..=1.0` (0.0 = coarsest, 1.0 = full detail).
    pub fn set_lod(&mut self, level: f32) {
        self.lod_level = level.clamp(0.0, 1.0);
        self.invalidate();
    }

    /// Enables or disables dense landmark synthesis.
    pub fn set_dense_landmarks(&mut self, enable: bool) {
        self.enable_dense_landmarks = enable;
        self.invalidate();
    }

    /// Enables or disables flat-region subdivision.
    pub fn set_subdivision(&mut self, enable: bool) {
        self.enable_subdivision = enable;
        self.invalidate();
    }

    #[inline]
    pub fn settings(&self) -> &MesherSettings {
        &self.settings
    }

    /// Replaces the tuning settings, invalidating the cached mesh.
    pub fn set_settings(&mut self, settings: MesherSettings) {
        self.settings = settings;
        self.invalidate();
    }

    /// Drops the cached mesh. The next [`generate`][Self::generate] call recomputes.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Number of times the full pipeline ran (i.e. cache misses). Intended for tests and
    /// diagnostics.
    #[inline]
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    /// Returns the detail multiplier for a triangle, derived from the best (lowest) priority
    /// rank among its 3 vertices' regions.
    pub fn triangle_detail_multiplier(&self, [i0, i1, i2]: Triangle) -> f32 {
        let min_priority = [i0, i1, i2]
            .into_iter()
            .map(|idx| classify_landmark(idx).priority)
            .min()
            .unwrap_or(u8::MAX);

        if min_priority <= 1 {
            self.settings.high_detail_multiplier
        } else if min_priority <= 3 {
            self.settings.medium_detail_multiplier
        } else {
            self.settings.low_detail_multiplier
        }
    }

    /// Generates (or returns the cached) adaptive mesh for `landmarks`.
    ///
    /// The returned reference borrows the mesher's cache slot: identical landmarks (as sampled
    /// by the positional hash) yield the cached mesh without recomputation unless
    /// `force_recompute` is set. Callers that need to mutate the result (e.g. to run
    /// [`subdivide_high_detail`][Self::subdivide_high_detail]) must clone it.
    ///
    /// Fewer than 3 landmarks produce an empty mesh.
    pub fn generate(&mut self, landmarks: &Landmarks, force_recompute: bool) -> &Mesh {
        let key = landmark_hash(landmarks);
        let hit = !force_recompute
            && self
                .cache
                .as_ref()
                .map_or(false, |slot| slot.key == key);

        if hit {
            log::trace!("adaptive mesh cache hit");
        } else {
            let mesh = self.compute(landmarks);
            self.recomputations += 1;
            self.cache = Some(CacheSlot { key, mesh });
        }

        let slot = self.cache.as_ref().unwrap(); // populated above
        &slot.mesh
    }

    fn compute(&self, input: &Landmarks) -> Mesh {
        if input.len() < 3 {
            return Mesh {
                triangles: Vec::new(),
                landmarks: input.clone(),
                stats: MeshStats {
                    original_landmarks: input.len(),
                    dense_landmarks: input.len(),
                    synthesized_points: 0,
                    triangle_count: 0,
                    lod_level: self.lod_level,
                },
            };
        }

        let mut landmarks = input.clone();
        if self.settings.enable_symmetry {
            enforce_symmetry(&mut landmarks);
        }

        // Boundary checks later on must use the real face outline, not synthesized points.
        let original = landmarks.clone();

        let synthesized = if self.enable_dense_landmarks {
            dense::synthesize_dense_landmarks(&mut landmarks)
        } else {
            0
        };
        let dense_len = landmarks.len();

        let triangles = delaunay::delaunay_triangles(&landmarks);
        let mut triangles = self.filter_triangles(triangles, &landmarks, &original);

        if self.enable_subdivision {
            self.subdivide_flat_regions(&mut triangles, &mut landmarks);
        }

        let stats = MeshStats {
            original_landmarks: input.len(),
            dense_landmarks: dense_len,
            synthesized_points: synthesized,
            triangle_count: triangles.len(),
            lod_level: self.lod_level,
        };
        log::trace!("adaptive mesh: {stats:?}");

        Mesh {
            triangles,
            landmarks,
            stats,
        }
    }

    /// Removes triangles that span across the face, leave the face boundary, or fall below the
    /// LOD-dependent area threshold for their region.
    fn filter_triangles(
        &self,
        triangles: Vec<Triangle>,
        landmarks: &Landmarks,
        original: &Landmarks,
    ) -> Vec<Triangle> {
        if triangles.is_empty() {
            return triangles;
        }

        let boundary = expand_boundary(&face_boundary(original), BOUNDARY_EXPANSION);

        let mut edge_lengths = Vec::with_capacity(triangles.len() * 3);
        for &[i0, i1, i2] in &triangles {
            let p0 = landmarks.get(i0).xy();
            let p1 = landmarks.get(i1).xy();
            let p2 = landmarks.get(i2).xy();
            edge_lengths.push(edge_length(p0, p1));
            edge_lengths.push(edge_length(p1, p2));
            edge_lengths.push(edge_length(p2, p0));
        }
        edge_lengths.sort_unstable_by_key(|&len| TotalF32(len));
        let percentile =
            edge_lengths[(edge_lengths.len() as f32 * EDGE_LENGTH_PERCENTILE) as usize];
        let max_edge = percentile * EDGE_LENGTH_MARGIN;

        // The area threshold only kicks in below full detail.
        let median_area = (self.lod_level < 0.99).then(|| {
            let mut areas = triangles
                .iter()
                .map(|&[i0, i1, i2]| {
                    triangle_area(
                        landmarks.get(i0).xy(),
                        landmarks.get(i1).xy(),
                        landmarks.get(i2).xy(),
                    )
                })
                .collect::<Vec<_>>();
            areas.sort_unstable_by_key(|&area| TotalF32(area));
            areas[areas.len() / 2]
        });

        triangles
            .into_iter()
            .filter(|&tri| {
                let [i0, i1, i2] = tri;
                let p0 = landmarks.get(i0).xy();
                let p1 = landmarks.get(i1).xy();
                let p2 = landmarks.get(i2).xy();

                if edge_length(p0, p1) > max_edge
                    || edge_length(p1, p2) > max_edge
                    || edge_length(p2, p0) > max_edge
                {
                    return false;
                }

                if !triangle_inside_boundary(p0, p1, p2, &boundary) {
                    return false;
                }

                if let Some(median) = median_area {
                    let multiplier = self.triangle_detail_multiplier(tri);
                    let min_area =
                        median * LOD_AREA_FACTOR * (1.0 - self.lod_level) * (1.0 - multiplier);
                    if triangle_area(p0, p1, p2) < min_area {
                        return false;
                    }
                }

                true
            })
            .collect()
    }

    /// Splits large triangles in medium/low-detail regions into 3 around their centroid.
    fn subdivide_flat_regions(&self, triangles: &mut Vec<Triangle>, landmarks: &mut Landmarks) {
        let mut subdivided = Vec::with_capacity(triangles.len());

        for &tri in triangles.iter() {
            let [i0, i1, i2] = tri;
            let region = classify_landmark(i0);
            let flat = matches!(region.tier, DetailTier::Medium | DetailTier::Low);
            let area = triangle_area(
                landmarks.get(i0).xy(),
                landmarks.get(i1).xy(),
                landmarks.get(i2).xy(),
            );

            if flat && area > FLAT_SUBDIVISION_AREA && self.lod_level > FLAT_SUBDIVISION_MIN_LOD {
                split_at_centroid(tri, landmarks, &mut subdivided);
            } else {
                subdivided.push(tri);
            }
        }

        *triangles = subdivided;
    }

    /// Optional extra pass splitting high-detail triangles around their centroids.
    ///
    /// This is not part of [`generate`][Self::generate]; callers that want even denser eye,
    /// lip and nose geometry run it on a cloned mesh. It only acts when the LOD level exceeds
    /// 0.7.
    pub fn subdivide_high_detail(&self, mesh: &mut Mesh) {
        if !(self.lod_level > HIGH_DETAIL_SUBDIVISION_MIN_LOD) {
            return;
        }

        let mut subdivided = Vec::with_capacity(mesh.triangles.len());
        for &tri in &mesh.triangles {
            if self.triangle_detail_multiplier(tri) >= self.settings.high_detail_multiplier {
                split_at_centroid(tri, &mut mesh.landmarks, &mut subdivided);
            } else {
                subdivided.push(tri);
            }
        }

        mesh.triangles = subdivided;
        mesh.stats.triangle_count = mesh.triangles.len();
    }
}

/// A triangle is inside the boundary only if all 3 vertices *and* the centroid are.
fn triangle_inside_boundary(
    p0: [f32; 2],
    p1: [f32; 2],
    p2: [f32; 2],
    boundary: &[[f32; 2]],
) -> bool {
    if !point_in_polygon(p0, boundary)
        || !point_in_polygon(p1, boundary)
        || !point_in_polygon(p2, boundary)
    {
        return false;
    }

    let centroid = [
        (p0[0] + p1[0] + p2[0]) / 3.0,
        (p0[1] + p1[1] + p2[1]) / 3.0,
    ];
    point_in_polygon(centroid, boundary)
}

fn split_at_centroid(tri: Triangle, landmarks: &mut Landmarks, out: &mut Vec<Triangle>) {
    let [i0, i1, i2] = tri;
    let p0 = landmarks.get(i0).position();
    let p1 = landmarks.get(i1).position();
    let p2 = landmarks.get(i2).position();

    let centroid = landmarks.push(Landmark::new([
        (p0[0] + p1[0] + p2[0]) / 3.0,
        (p0[1] + p1[1] + p2[1]) / 3.0,
        (p0[2] + p1[2] + p2[2]) / 3.0,
    ]));

    out.push([i0, i1, centroid]);
    out.push([i1, i2, centroid]);
    out.push([i2, i0, centroid]);
}

/// Hashes a small fixed sample of landmark coordinates, rounded to 3 decimals, to detect
/// frame-to-frame changes cheaply. Not a general-purpose hash.
fn landmark_hash(landmarks: &Landmarks) -> u64 {
    let mut hasher = DefaultHasher::new();
    for &idx in &HASH_SAMPLE_INDICES {
        if idx < landmarks.len() {
            let lm = landmarks.get(idx);
            ((lm.x() * 1000.0).round() as i64).hash(&mut hasher);
            ((lm.y() * 1000.0).round() as i64).hash(&mut hasher);
        }
    }
    hasher.finish()
}
