//! Renders an adaptive face mesh as a depth-shaded wireframe mask overlay.
//!
//! This is the 2D presentation layer over the [`Mesh`] output contract: triangles are filled
//! and stroked (optionally colorized by depth), facial contours are traced on top, and landmark
//! vertices can be dotted in. All drawing happens in-place on an [`Image`].

use itertools::Itertools;

use crate::image::{draw, Color, Image};
use crate::mask::style::MaskStyle;
use crate::mesh::Mesh;
use crate::num::{to_channel, TotalF32};
use crate::topology::{ContourKind, CANONICAL_LANDMARKS, CONTOURS};

pub mod style;

/// Draws `mesh` onto `image`, scaling normalized landmark coordinates to the image size.
///
/// Triangles or contours referencing out-of-range landmark indices are skipped; a mesh from a
/// foreign landmark set degrades to a partial overlay rather than a panic.
pub fn draw_mask(image: &mut Image, mesh: &Mesh, style: &MaskStyle) {
    let landmarks = mesh.landmarks();
    if landmarks.is_empty() || image.width() == 0 || image.height() == 0 {
        return;
    }

    let width = image.width() as f32;
    let height = image.height() as f32;
    let to_pixel = |idx: usize| {
        let lm = landmarks.get(idx);
        [lm.x() * width, lm.y() * height]
    };

    // Normalize depth over the canonical landmarks only; synthesized points interpolate
    // between them and cannot extend the range.
    let (min_z, max_z) = match landmarks
        .iter()
        .take(CANONICAL_LANDMARKS)
        .map(|lm| TotalF32(lm.z()))
        .minmax()
        .into_option()
    {
        Some((min, max)) => (min.0, max.0),
        None => return,
    };
    let z_range = if max_z - min_z > 0.0 { max_z - min_z } else { 0.1 };
    let depth_color = |z: f32, alpha: f32| depth_gradient((z - min_z) / z_range, alpha);

    if style.show_triangles {
        for &[i0, i1, i2] in mesh.triangles() {
            if i0 >= landmarks.len() || i1 >= landmarks.len() || i2 >= landmarks.len() {
                continue;
            }

            let p0 = to_pixel(i0);
            let p1 = to_pixel(i1);
            let p2 = to_pixel(i2);
            let avg_z =
                (landmarks.get(i0).z() + landmarks.get(i1).z() + landmarks.get(i2).z()) / 3.0;

            let (fill, stroke) = if style.use_depth {
                (
                    depth_color(avg_z, style.fill_opacity * 2.0),
                    depth_color(avg_z, 0.35),
                )
            } else {
                (
                    with_opacity(style.fill_color, style.fill_opacity),
                    with_opacity(style.stroke_color, 0.4),
                )
            };

            if style.fill_opacity > 0.0 {
                draw::fill_triangle(image, p0, p1, p2, fill);
            }
            draw::stroke_triangle(image, p0, p1, p2, stroke, style.line_width);
        }
    }

    if style.show_contours {
        for &(kind, indices) in CONTOURS {
            if !style.shows_contour(kind) {
                continue;
            }

            let points = indices
                .iter()
                .filter(|&&idx| idx < landmarks.len())
                .map(|&idx| to_pixel(idx))
                .collect::<Vec<_>>();
            if points.len() < 2 {
                continue;
            }

            let color = if style.use_depth {
                let valid = indices.iter().filter(|&&idx| idx < landmarks.len());
                let (sum, count) = valid.fold((0.0, 0u32), |(sum, count), &idx| {
                    (sum + landmarks.get(idx).z(), count + 1)
                });
                depth_color(sum / count as f32, 0.7)
            } else {
                contour_color(kind, style.contour_color)
            };

            // The face outline reads better slightly heavier than the inner contours.
            let stroke_width = match kind {
                ContourKind::FaceOval => (style.contour_width as f32 * 1.3).round() as u32,
                _ => style.contour_width,
            };
            draw::polyline(image, &points, color, stroke_width);
        }
    }

    if style.show_vertices && style.vertex_radius > 0 {
        for (i, lm) in landmarks.iter().take(CANONICAL_LANDMARKS).enumerate() {
            let color = if style.use_depth {
                depth_color(lm.z(), 0.8)
            } else {
                with_opacity(style.stroke_color, 0.7)
            };
            draw::fill_circle(image, to_pixel(i), style.vertex_radius, color);
        }
    }
}

fn with_opacity(color: Color, opacity: f32) -> Color {
    color.with_alpha(to_channel(opacity * 255.0))
}

/// Vivid depth gradient: warm yellow for close geometry, through cyan, to purple for far
/// geometry. `t` is the normalized depth (0 = closest).
fn depth_gradient(t: f32, alpha: f32) -> Color {
    let (r, g, b) = if t < 0.5 {
        let t2 = t * 2.0;
        (255.0 * (1.0 - t2), 220.0 + 35.0 * t2, 50.0 + 205.0 * t2)
    } else {
        let t2 = (t - 0.5) * 2.0;
        (150.0 * t2, 255.0 * (1.0 - t2 * 0.6), 255.0)
    };
    Color::from_rgba8(
        to_channel(r),
        to_channel(g),
        to_channel(b),
        to_channel(alpha * 255.0),
    )
}

fn contour_color(kind: ContourKind, base: Color) -> Color {
    match kind {
        ContourKind::FaceOval | ContourKind::NoseBridge | ContourKind::NoseBottom => {
            with_opacity(base, 0.4)
        }
        ContourKind::LeftEye | ContourKind::RightEye => with_opacity(base, 0.7),
        ContourKind::LeftEyebrow | ContourKind::RightEyebrow => with_opacity(base, 0.5),
        ContourKind::LipsOuter => Color::from_rgba8(255, 120, 150, to_channel(0.6 * 255.0)),
        ContourKind::LipsInner => Color::from_rgba8(255, 80, 120, to_channel(0.5 * 255.0)),
    }
}

#[cfg(test)]
mod tests {
    use crate::mesh::AdaptiveMesher;
    use crate::test::synthetic_face;

    use super::*;

    fn any_opaque_pixel(image: &Image) -> bool {
        image.data().chunks_exact(4).any(|px| px[3] > 0)
    }

    #[test]
    fn drawing_a_mesh_produces_visible_pixels() {
        let face = synthetic_face();
        let mut mesher = AdaptiveMesher::new();
        let mesh = mesher.generate(&face, false).clone();

        let mut image = Image::new(128, 128);
        draw_mask(&mut image, &mesh, &MaskStyle::default());
        assert!(any_opaque_pixel(&image));
    }

    #[test]
    fn depth_shaded_drawing_also_works() {
        let face = synthetic_face();
        let mut mesher = AdaptiveMesher::new();
        let mesh = mesher.generate(&face, false).clone();

        let mut image = Image::new(64, 64);
        let style = MaskStyle {
            use_depth: true,
            show_vertices: true,
            ..MaskStyle::default()
        };
        draw_mask(&mut image, &mesh, &style);
        assert!(any_opaque_pixel(&image));
    }

    #[test]
    fn empty_mesh_draws_nothing() {
        let mut mesher = AdaptiveMesher::new();
        let mesh = mesher.generate(&crate::landmark::Landmarks::new(0), false).clone();

        let mut image = Image::new(32, 32);
        draw_mask(&mut image, &mesh, &MaskStyle::default());
        assert!(!any_opaque_pixel(&image));
    }

    #[test]
    fn gradient_endpoints_are_warm_and_cool() {
        let close = depth_gradient(0.0, 1.0);
        assert_eq!((close.r(), close.g(), close.b()), (255, 220, 50));
        let far = depth_gradient(1.0, 1.0);
        assert_eq!((far.r(), far.g(), far.b()), (150, 102, 255));
    }
}
