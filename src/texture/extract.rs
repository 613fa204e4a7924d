//! Extracts a face texture from a photo and warps it into the canonical UV layout.

use crate::geom::{point_in_polygon, AffineTransform};
use crate::image::Image;
use crate::landmark::Landmarks;
use crate::texture::{HeadPose, DEFAULT_TEXTURE_SIZE, UV_LEFT_EYE, UV_NOSE, UV_RIGHT_EYE};
use crate::topology::{LandmarkIdx, CANONICAL_LANDMARKS, FACE_OVAL};

/// Normalized nose offset beyond which the head counts as turned. Empirically tuned.
const YAW_OFFSET_THRESHOLD: f32 = 0.03;
/// Face-contour asymmetry ratio bounds outside of which the head counts as turned.
/// Empirically tuned.
const CONTOUR_RATIO_LOW: f32 = 0.85;
const CONTOUR_RATIO_HIGH: f32 = 1.15;

/// Pixel padding added around the landmark bounding box by the fallback extraction.
const BOUNDING_BOX_PADDING: f32 = 20.0;

/// How an [`ExtractedTexture`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// The anchor-based affine warp into the canonical UV layout.
    Affine,
    /// Bounding-box crop fallback, used when the anchor landmarks are degenerate.
    BoundingBox,
}

/// A face texture in canonical UV space, with the provenance the blender needs.
#[derive(Debug, Clone)]
pub struct ExtractedTexture {
    pub image: Image,
    /// Head pose detected in the source photo.
    pub pose: HeadPose,
    /// Which extraction strategy produced the texture.
    pub method: ExtractionMethod,
    /// The source landmarks the texture was extracted with.
    pub landmarks: Landmarks,
}

/// Warps face photos into the canonical square UV layout.
#[derive(Debug, Clone)]
pub struct TextureExtractor {
    output_size: u32,
}

impl Default for TextureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureExtractor {
    pub fn new() -> Self {
        Self {
            output_size: DEFAULT_TEXTURE_SIZE,
        }
    }

    pub fn with_output_size(output_size: u32) -> Self {
        Self { output_size }
    }

    #[inline]
    pub fn output_size(&self) -> u32 {
        self.output_size
    }

    /// Extracts the face from `source` into a square texture.
    ///
    /// The left eye outer corner, right eye outer corner and nose tip landmarks are mapped onto
    /// the canonical UV anchors by an affine transform; the rest of the image follows that
    /// transform, and everything outside the face-oval silhouette becomes fully transparent.
    ///
    /// When the anchors are (nearly) collinear the affine solve has no solution; the extraction
    /// then degrades to a padded bounding-box crop over the canonical landmarks, reported via
    /// [`ExtractionMethod::BoundingBox`]. A landmark set shorter than the canonical topology
    /// also takes the fallback path.
    pub fn extract(&self, source: &Image, landmarks: &Landmarks) -> ExtractedTexture {
        let pose = detect_head_pose(landmarks);

        if landmarks.len() >= CANONICAL_LANDMARKS {
            let src_anchor = |idx: LandmarkIdx| {
                let lm = landmarks.get(idx.into());
                [
                    f64::from(lm.x()) * f64::from(source.width()),
                    f64::from(lm.y()) * f64::from(source.height()),
                ]
            };
            let dst_anchor = |uv: [f32; 2]| {
                [
                    f64::from(uv[0]) * f64::from(self.output_size),
                    f64::from(uv[1]) * f64::from(self.output_size),
                ]
            };

            let transform = AffineTransform::from_points(
                [
                    src_anchor(LandmarkIdx::LeftEyeOuterCorner),
                    src_anchor(LandmarkIdx::RightEyeOuterCorner),
                    src_anchor(LandmarkIdx::NoseTip),
                ],
                [
                    dst_anchor(UV_LEFT_EYE),
                    dst_anchor(UV_RIGHT_EYE),
                    dst_anchor(UV_NOSE),
                ],
            );

            if let Some((transform, inverse)) = transform.and_then(|t| Some((t, t.invert()?))) {
                let image = self.warp(source, landmarks, &transform, &inverse);
                return ExtractedTexture {
                    image,
                    pose,
                    method: ExtractionMethod::Affine,
                    landmarks: landmarks.clone(),
                };
            }
            log::debug!("degenerate anchor landmarks, falling back to bounding-box extraction");
        }

        ExtractedTexture {
            image: self.bounding_box_extract(source, landmarks),
            pose,
            method: ExtractionMethod::BoundingBox,
            landmarks: landmarks.clone(),
        }
    }

    /// Inverse-maps every output pixel through the affine transform and samples the source with
    /// nearest-neighbor lookup, masked by the face-oval silhouette.
    fn warp(
        &self,
        source: &Image,
        landmarks: &Landmarks,
        transform: &AffineTransform,
        inverse: &AffineTransform,
    ) -> Image {
        let size = self.output_size;
        let src_w = f64::from(source.width());
        let src_h = f64::from(source.height());

        // Face silhouette in output space: oval landmarks through the same transform.
        let silhouette = FACE_OVAL
            .iter()
            .filter(|&&idx| idx < landmarks.len())
            .map(|&idx| {
                let lm = landmarks.get(idx);
                let (x, y) = transform.apply(f64::from(lm.x()) * src_w, f64::from(lm.y()) * src_h);
                [x as f32, y as f32]
            })
            .collect::<Vec<_>>();

        let mut out = Image::new(size, size);
        for y in 0..size {
            for x in 0..size {
                let center = [x as f32 + 0.5, y as f32 + 0.5];
                if !point_in_polygon(center, &silhouette) {
                    continue;
                }

                let (sx, sy) = inverse.apply(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if sx < 0.0 || sy < 0.0 || sx >= src_w || sy >= src_h {
                    continue;
                }
                out.set(x, y, source.get(sx as u32, sy as u32));
            }
        }
        out
    }

    /// Crops the padded landmark bounding box and resizes it to the output square.
    fn bounding_box_extract(&self, source: &Image, landmarks: &Landmarks) -> Image {
        let size = self.output_size;
        if landmarks.is_empty() || source.width() == 0 || source.height() == 0 {
            return Image::new(size, size);
        }

        let src_w = source.width() as f32;
        let src_h = source.height() as f32;

        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for lm in landmarks.iter().take(CANONICAL_LANDMARKS) {
            min_x = min_x.min(lm.x() * src_w);
            min_y = min_y.min(lm.y() * src_h);
            max_x = max_x.max(lm.x() * src_w);
            max_y = max_y.max(lm.y() * src_h);
        }

        let min_x = (min_x - BOUNDING_BOX_PADDING).max(0.0);
        let min_y = (min_y - BOUNDING_BOX_PADDING).max(0.0);
        let max_x = (max_x + BOUNDING_BOX_PADDING).min(src_w);
        let max_y = (max_y + BOUNDING_BOX_PADDING).min(src_h);
        if max_x <= min_x || max_y <= min_y {
            return Image::new(size, size);
        }

        let mut out = Image::new(size, size);
        for y in 0..size {
            for x in 0..size {
                let sx = min_x + (x as f32 + 0.5) / size as f32 * (max_x - min_x);
                let sy = min_y + (y as f32 + 0.5) / size as f32 * (max_y - min_y);
                let sx = (sx as u32).min(source.width() - 1);
                let sy = (sy as u32).min(source.height() - 1);
                out.set(x, y, source.get(sx, sy));
            }
        }
        out
    }
}

/// Estimates the head yaw from landmark asymmetry.
///
/// Two signals vote: the horizontal offset of the nose tip from the eye center (normalized by
/// the eye distance), and the ratio of the distances from the eye center to the two face edges
/// (more reliable at larger angles). This is a heuristic with tuned thresholds, not a geometric
/// solve. Landmark sets shorter than the canonical topology classify as [`HeadPose::Front`].
pub fn detect_head_pose(landmarks: &Landmarks) -> HeadPose {
    if landmarks.len() < CANONICAL_LANDMARKS {
        return HeadPose::Front;
    }

    let left_eye = landmarks.get(LandmarkIdx::LeftEyeOuterCorner.into());
    let right_eye = landmarks.get(LandmarkIdx::RightEyeOuterCorner.into());
    let nose_tip = landmarks.get(LandmarkIdx::NoseTip.into());
    let left_contour = landmarks.get(LandmarkIdx::LeftFaceEdge.into());
    let right_contour = landmarks.get(LandmarkIdx::RightFaceEdge.into());

    let eye_distance = right_eye.x() - left_eye.x();
    let eye_center = (left_eye.x() + right_eye.x()) / 2.0;
    let nose_offset = nose_tip.x() - eye_center;

    let left_edge_dist = eye_center - left_contour.x();
    let right_edge_dist = right_contour.x() - eye_center;
    let contour_ratio = left_edge_dist / (right_edge_dist + 0.001);

    let normalized_offset = nose_offset / eye_distance;

    // Looking right: the nose shifts left in the image and the left face side dominates.
    if normalized_offset < -YAW_OFFSET_THRESHOLD || contour_ratio > CONTOUR_RATIO_HIGH {
        return HeadPose::Right;
    }
    if normalized_offset > YAW_OFFSET_THRESHOLD || contour_ratio < CONTOUR_RATIO_LOW {
        return HeadPose::Left;
    }
    HeadPose::Front
}

#[cfg(test)]
mod tests {
    use crate::landmark::{Landmark, Landmarks};
    use crate::topology::FACE_OVAL;

    use super::*;

    /// 468 landmarks whose anchors already sit at the canonical UV positions, with the face
    /// oval on a circle of radius 0.4. Extraction from an equally-sized source image is then an
    /// identity warp.
    fn canonical_landmarks() -> Landmarks {
        let mut lms = Landmarks::new(CANONICAL_LANDMARKS);
        for pos in lms.positions_mut() {
            *pos = [0.5, 0.5, 0.0];
        }
        for (i, &idx) in FACE_OVAL.iter().enumerate() {
            let angle = i as f32 / FACE_OVAL.len() as f32 * std::f32::consts::TAU;
            lms.set(
                idx,
                Landmark::new([0.5 + 0.4 * angle.sin(), 0.5 - 0.4 * angle.cos(), 0.0]),
            );
        }
        lms.set(
            LandmarkIdx::LeftEyeOuterCorner.into(),
            Landmark::new([UV_LEFT_EYE[0], UV_LEFT_EYE[1], 0.0]),
        );
        lms.set(
            LandmarkIdx::RightEyeOuterCorner.into(),
            Landmark::new([UV_RIGHT_EYE[0], UV_RIGHT_EYE[1], 0.0]),
        );
        lms.set(
            LandmarkIdx::NoseTip.into(),
            Landmark::new([UV_NOSE[0], UV_NOSE[1], 0.0]),
        );
        lms
    }

    fn gradient_image(size: u32) -> Image {
        let mut image = Image::new(size, size);
        for y in 0..size {
            for x in 0..size {
                image.set(
                    x,
                    y,
                    crate::image::Color::from_rgb8((x * 2) as u8, (y * 2) as u8, 7),
                );
            }
        }
        image
    }

    #[test]
    fn identity_anchors_produce_identity_warp() {
        let size = 64;
        let source = gradient_image(size);
        let lms = canonical_landmarks();

        let extractor = TextureExtractor::with_output_size(size);
        let texture = extractor.extract(&source, &lms);

        assert_eq!(texture.method, ExtractionMethod::Affine);
        assert_eq!(texture.pose, HeadPose::Front);

        // Inside the silhouette the texture matches the source 1:1.
        assert_eq!(texture.image.get(32, 32), source.get(32, 32));
        assert_eq!(texture.image.get(32, 16), source.get(32, 16));
        // The corners are outside the face oval and stay transparent.
        assert_eq!(texture.image.get(0, 0).a(), 0);
        assert_eq!(texture.image.get(size - 1, size - 1).a(), 0);
    }

    #[test]
    fn collinear_anchors_fall_back_to_bounding_box() {
        let mut lms = canonical_landmarks();
        // All three anchors on one horizontal line.
        lms.set(LandmarkIdx::NoseTip.into(), Landmark::new([0.5, 0.35, 0.0]));

        let source = gradient_image(64);
        let extractor = TextureExtractor::with_output_size(64);
        let texture = extractor.extract(&source, &lms);
        assert_eq!(texture.method, ExtractionMethod::BoundingBox);
        // The crop is opaque everywhere (no silhouette masking on the fallback path).
        assert_eq!(texture.image.get(32, 32).a(), 255);
    }

    #[test]
    fn short_landmark_sets_fall_back_to_bounding_box() {
        let lms = Landmarks::from_positions(vec![[0.25, 0.25, 0.0], [0.75, 0.75, 0.0]]);
        let source = gradient_image(64);
        let extractor = TextureExtractor::with_output_size(32);
        let texture = extractor.extract(&source, &lms);
        assert_eq!(texture.method, ExtractionMethod::BoundingBox);
        assert_eq!(texture.pose, HeadPose::Front);
    }

    fn pose_landmarks(nose_x: f32, left_edge_x: f32, right_edge_x: f32) -> Landmarks {
        let mut lms = Landmarks::new(CANONICAL_LANDMARKS);
        lms.set(
            LandmarkIdx::LeftEyeOuterCorner.into(),
            Landmark::new([0.35, 0.4, 0.0]),
        );
        lms.set(
            LandmarkIdx::RightEyeOuterCorner.into(),
            Landmark::new([0.65, 0.4, 0.0]),
        );
        lms.set(LandmarkIdx::NoseTip.into(), Landmark::new([nose_x, 0.55, 0.0]));
        lms.set(
            LandmarkIdx::LeftFaceEdge.into(),
            Landmark::new([left_edge_x, 0.5, 0.0]),
        );
        lms.set(
            LandmarkIdx::RightFaceEdge.into(),
            Landmark::new([right_edge_x, 0.5, 0.0]),
        );
        lms
    }

    #[test]
    fn centered_nose_reads_as_front() {
        let lms = pose_landmarks(0.5, 0.2, 0.8);
        assert_eq!(detect_head_pose(&lms), HeadPose::Front);
    }

    #[test]
    fn nose_offset_flips_the_label() {
        // Nose shifted towards the image right: the person looks to their left.
        assert_eq!(detect_head_pose(&pose_landmarks(0.53, 0.2, 0.8)), HeadPose::Left);
        // Nose shifted towards the image left.
        assert_eq!(detect_head_pose(&pose_landmarks(0.47, 0.2, 0.8)), HeadPose::Right);
    }

    #[test]
    fn contour_asymmetry_flips_the_label() {
        // More face visible on the image-left side.
        assert_eq!(detect_head_pose(&pose_landmarks(0.5, 0.1, 0.75)), HeadPose::Right);
        // More face visible on the image-right side.
        assert_eq!(detect_head_pose(&pose_landmarks(0.5, 0.25, 0.9)), HeadPose::Left);
    }

    #[test]
    fn short_sets_read_as_front() {
        assert_eq!(detect_head_pose(&Landmarks::new(10)), HeadPose::Front);
    }
}
