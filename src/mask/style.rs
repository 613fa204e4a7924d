//! Style options for the mask overlay.

use crate::image::Color;
use crate::topology::ContourKind;

/// Visual options for [`draw_mask`][crate::mask::draw_mask].
#[derive(Debug, Clone, PartialEq)]
pub struct MaskStyle {
    /// Colorize triangles, contours and vertices by normalized landmark depth instead of the
    /// flat colors below.
    pub use_depth: bool,
    pub show_triangles: bool,
    pub show_contours: bool,
    pub show_vertices: bool,
    /// Stroke width of triangle edges.
    pub line_width: u32,
    /// Radius of vertex dots; 0 disables them even when `show_vertices` is set.
    pub vertex_radius: u32,
    pub stroke_color: Color,
    pub fill_color: Color,
    /// Triangle fill opacity in `0.0..=1.0`; 0 disables filling.
    pub fill_opacity: f32,
    pub contour_color: Color,
    pub contour_width: u32,
    pub show_eyes: bool,
    pub show_eyebrows: bool,
    pub show_lips: bool,
    pub show_nose: bool,
    pub show_face_oval: bool,
}

impl Default for MaskStyle {
    fn default() -> Self {
        Self {
            use_depth: false,
            show_triangles: true,
            show_contours: true,
            show_vertices: false,
            line_width: 1,
            vertex_radius: 2,
            stroke_color: Color::from_rgb8(0x00, 0xff, 0xff),
            fill_color: Color::WHITE,
            fill_opacity: 0.05,
            contour_color: Color::from_rgb8(0x00, 0xff, 0x88),
            contour_width: 2,
            show_eyes: true,
            show_eyebrows: true,
            show_lips: true,
            show_nose: true,
            show_face_oval: true,
        }
    }
}

impl MaskStyle {
    /// Whether a contour of the given kind is visible under this style.
    pub fn shows_contour(&self, kind: ContourKind) -> bool {
        match kind {
            ContourKind::FaceOval => self.show_face_oval,
            ContourKind::LeftEye | ContourKind::RightEye => self.show_eyes,
            ContourKind::LeftEyebrow | ContourKind::RightEyebrow => self.show_eyebrows,
            ContourKind::LipsOuter | ContourKind::LipsInner => self.show_lips,
            ContourKind::NoseBridge | ContourKind::NoseBottom => self.show_nose,
        }
    }
}
