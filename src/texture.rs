//! Face texture extraction and multi-photo blending.
//!
//! [`TextureExtractor`] warps a photographed face into a canonical square UV layout;
//! [`TextureBlender`] averages several such textures (optionally pose-aware) into one composite
//! that a renderer can project back onto a live face mesh.
//!
//! # Canonical UV layout
//!
//! Extracted textures anchor the face at fixed fractional positions of the square output:
//! left eye outer corner at [`UV_LEFT_EYE`], right eye outer corner at [`UV_RIGHT_EYE`], nose
//! tip at [`UV_NOSE`]. These constants are a contract shared with any consumer that re-projects
//! the texture onto mesh geometry; if the two sides disagree, texture alignment breaks.

pub mod blend;
pub mod extract;

pub use blend::TextureBlender;
pub use extract::{detect_head_pose, ExtractedTexture, ExtractionMethod, TextureExtractor};

/// Default side length of extracted and blended textures, in pixels.
pub const DEFAULT_TEXTURE_SIZE: u32 = 512;

/// Fractional position of the left eye outer corner in the output texture.
pub const UV_LEFT_EYE: [f32; 2] = [0.30, 0.35];
/// Fractional position of the right eye outer corner in the output texture.
pub const UV_RIGHT_EYE: [f32; 2] = [0.70, 0.35];
/// Fractional position of the nose tip in the output texture.
pub const UV_NOSE: [f32; 2] = [0.50, 0.55];

/// Coarse head yaw classification.
///
/// "Left" and "Right" are from the PoV of the depicted person: a person looking to their left
/// shows the right side of their face to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadPose {
    Front,
    Left,
    Right,
}
