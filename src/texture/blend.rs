//! Combines several extracted face textures into one composite.

use crate::image::Image;
use crate::landmark::Landmarks;
use crate::texture::{ExtractedTexture, HeadPose, DEFAULT_TEXTURE_SIZE};

/// Alpha a pixel must exceed to contribute to a blend. Near-transparent fringe pixels carry
/// mostly resampling noise and are ignored.
const CONTRIBUTION_ALPHA: u8 = 30;

/// Start/end of the horizontal transition zones of the pose-aware blend: side-pose textures
/// take over outside the center band, linearly faded across these bounds. Empirically tuned.
const POSE_RAMP_START: f32 = 0.35;
const POSE_RAMP_END: f32 = 0.65;

struct BlendEntry {
    image: Image,
    weight: f32,
    pose: HeadPose,
    #[allow(dead_code)] // provenance, kept for consumers inspecting blender inputs
    landmarks: Option<Landmarks>,
}

/// Accumulates face textures and blends them pixel by pixel.
///
/// Textures are owned by the blender until [`clear`][Self::clear]; blend outputs are new,
/// independently owned buffers.
pub struct TextureBlender {
    output_size: u32,
    entries: Vec<BlendEntry>,
}

impl Default for TextureBlender {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureBlender {
    pub fn new() -> Self {
        Self::with_output_size(DEFAULT_TEXTURE_SIZE)
    }

    pub fn with_output_size(output_size: u32) -> Self {
        Self {
            output_size,
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn output_size(&self) -> u32 {
        self.output_size
    }

    /// Adds an extracted texture with its provenance metadata.
    pub fn add(&mut self, texture: ExtractedTexture, weight: f32) {
        log::debug!("adding texture with pose {:?}", texture.pose);
        self.entries.push(BlendEntry {
            image: texture.image,
            weight,
            pose: texture.pose,
            landmarks: Some(texture.landmarks),
        });
    }

    /// Adds a bare image without landmarks, e.g. a texture from an external source.
    pub fn add_image(&mut self, image: Image, weight: f32, pose: HeadPose) {
        self.entries.push(BlendEntry {
            image,
            weight,
            pose,
            landmarks: None,
        });
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops all accumulated textures.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Blends all accumulated textures by per-pixel weighted averaging.
    ///
    /// Returns [`None`] with no textures, a plain copy with one, and the weighted average
    /// otherwise. Each pixel averages the entries whose alpha exceeds the contribution
    /// threshold, weighted by `(alpha / 255) * weight`; pixels no entry covers stay
    /// transparent.
    pub fn blend(&self) -> Option<Image> {
        log::debug!("blending {} textures", self.entries.len());
        match self.entries.as_slice() {
            [] => None,
            [single] => Some(single.image.clone()),
            _ => Some(self.blend_average()),
        }
    }

    fn blend_average(&self) -> Image {
        let size = self.output_size;
        let scaled = self
            .entries
            .iter()
            .map(|entry| scale_to(&entry.image, size))
            .collect::<Vec<_>>();

        let mut out = Image::new(size, size);
        for (i, px) in out.data_mut().chunks_exact_mut(4).enumerate() {
            let mut acc = [0.0f32; 4];
            let mut total_weight = 0.0f32;

            for (image, entry) in scaled.iter().zip(&self.entries) {
                let src = &image.data()[i * 4..i * 4 + 4];
                if src[3] > CONTRIBUTION_ALPHA {
                    let weight = f32::from(src[3]) / 255.0 * entry.weight;
                    for channel in 0..3 {
                        acc[channel] += f32::from(src[channel]) * weight;
                    }
                    acc[3] += f32::from(src[3]) * weight;
                    total_weight += weight;
                }
            }

            if total_weight > 0.0 {
                for channel in 0..3 {
                    px[channel] = crate::num::to_channel(acc[channel] / total_weight);
                }
                px[3] = crate::num::to_channel((acc[3] / total_weight).min(255.0));
            }
        }
        out
    }

    /// Pose-aware blend: textures are grouped by head pose, averaged within each group, and
    /// recombined with a horizontal weight ramp so each side of the output prefers the pose
    /// that photographed that side best.
    ///
    /// The front group dominates the center band; the left-pose group (which shows the right
    /// side of the face) feeds the right third and vice versa, with linear transitions across
    /// the 35%–65% zones. Falls back to plain averaging when every texture is frontal.
    pub fn blend_pose_aware(&self) -> Option<Image> {
        if self.entries.is_empty() {
            return None;
        }

        let group = |pose: HeadPose| {
            self.entries
                .iter()
                .filter(move |entry| entry.pose == pose)
                .collect::<Vec<_>>()
        };
        let front = group(HeadPose::Front);
        let left = group(HeadPose::Left);
        let right = group(HeadPose::Right);
        log::debug!(
            "pose-aware blend: {} front, {} left, {} right",
            front.len(),
            left.len(),
            right.len()
        );

        if front.len() == self.entries.len() {
            return Some(self.blend_average());
        }

        let size = self.output_size;
        // With no frontal texture at all, every texture anchors the center band.
        let front_data = if front.is_empty() {
            group_average(&self.entries.iter().collect::<Vec<_>>(), size)
        } else {
            group_average(&front, size)
        };
        let left_data = group_average(&left, size);
        let right_data = group_average(&right, size);

        let mut out = Image::new(size, size);
        for y in 0..size {
            for x in 0..size {
                let nx = x as f32 / size as f32;

                let mut left_w = 0.0;
                let mut front_w = 1.0;
                let mut right_w = 0.0;
                if nx < POSE_RAMP_START {
                    left_w = 1.0 - nx / POSE_RAMP_START;
                    front_w = nx / POSE_RAMP_START;
                } else if nx > POSE_RAMP_END {
                    right_w = (nx - POSE_RAMP_END) / (1.0 - POSE_RAMP_END);
                    front_w = 1.0 - right_w;
                }

                let mut acc = [0.0f32; 4];
                let mut total_weight = 0.0f32;
                let mut contribute = |image: &Option<Image>, weight: f32| {
                    if let Some(image) = image {
                        let px = image.get(x, y);
                        if px.a() > CONTRIBUTION_ALPHA {
                            acc[0] += f32::from(px.r()) * weight;
                            acc[1] += f32::from(px.g()) * weight;
                            acc[2] += f32::from(px.b()) * weight;
                            acc[3] += f32::from(px.a()) * weight;
                            total_weight += weight;
                        }
                    }
                };

                contribute(&front_data, front_w);
                // A left-turned head photographs the right side of the face, and vice versa.
                if right_w > 0.0 {
                    contribute(&left_data, right_w);
                }
                if left_w > 0.0 {
                    contribute(&right_data, left_w);
                }

                if total_weight > 0.0 {
                    out.set(
                        x,
                        y,
                        crate::image::Color::from_rgba8(
                            crate::num::to_channel(acc[0] / total_weight),
                            crate::num::to_channel(acc[1] / total_weight),
                            crate::num::to_channel(acc[2] / total_weight),
                            crate::num::to_channel(acc[3] / total_weight),
                        ),
                    );
                }
            }
        }
        Some(out)
    }
}

fn scale_to(image: &Image, size: u32) -> Image {
    if image.width() == size && image.height() == size {
        image.clone()
    } else {
        image.resized_nearest(size, size)
    }
}

/// Averages a group of textures pixel by pixel (unweighted, alpha-gated).
fn group_average(entries: &[&BlendEntry], size: u32) -> Option<Image> {
    if entries.is_empty() {
        return None;
    }

    let scaled = entries
        .iter()
        .map(|entry| scale_to(&entry.image, size))
        .collect::<Vec<_>>();

    let mut out = Image::new(size, size);
    for (i, px) in out.data_mut().chunks_exact_mut(4).enumerate() {
        let mut acc = [0.0f32; 4];
        let mut count = 0u32;
        for image in &scaled {
            let src = &image.data()[i * 4..i * 4 + 4];
            if src[3] > CONTRIBUTION_ALPHA {
                for channel in 0..4 {
                    acc[channel] += f32::from(src[channel]);
                }
                count += 1;
            }
        }
        if count > 0 {
            for channel in 0..4 {
                px[channel] = crate::num::to_channel(acc[channel] / count as f32);
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use crate::image::Color;

    use super::*;

    fn uniform(size: u32, color: Color) -> Image {
        let mut image = Image::new(size, size);
        image.clear(color);
        image
    }

    #[test]
    fn empty_blender_yields_nothing() {
        assert!(TextureBlender::new().blend().is_none());
        assert!(TextureBlender::new().blend_pose_aware().is_none());
    }

    #[test]
    fn single_texture_is_copied_unchanged() {
        let mut blender = TextureBlender::with_output_size(8);
        let image = uniform(8, Color::from_rgb8(1, 2, 3));
        blender.add_image(image.clone(), 1.0, HeadPose::Front);
        assert_eq!(blender.blend().unwrap(), image);
    }

    #[test]
    fn equal_weights_average_channels() {
        let mut blender = TextureBlender::with_output_size(8);
        blender.add_image(uniform(8, Color::from_rgb8(200, 0, 0)), 1.0, HeadPose::Front);
        blender.add_image(uniform(8, Color::from_rgb8(0, 200, 0)), 1.0, HeadPose::Front);

        let out = blender.blend().unwrap();
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(out.get(x, y), Color::from_rgb8(100, 100, 0));
            }
        }
    }

    #[test]
    fn weights_bias_the_average() {
        let mut blender = TextureBlender::with_output_size(4);
        blender.add_image(uniform(4, Color::from_rgb8(200, 0, 0)), 2.0, HeadPose::Front);
        blender.add_image(uniform(4, Color::from_rgb8(0, 200, 0)), 1.0, HeadPose::Front);

        let out = blender.blend().unwrap();
        assert_eq!(out.get(0, 0), Color::from_rgb8(133, 67, 0));
    }

    #[test]
    fn transparent_pixels_are_skipped() {
        let mut blender = TextureBlender::with_output_size(2);
        let mut partial = uniform(2, Color::from_rgb8(200, 0, 0));
        partial.set(0, 0, Color::NONE);
        blender.add_image(partial, 1.0, HeadPose::Front);
        blender.add_image(uniform(2, Color::from_rgb8(0, 200, 0)), 1.0, HeadPose::Front);

        let out = blender.blend().unwrap();
        // Only the green texture covers (0, 0).
        assert_eq!(out.get(0, 0), Color::from_rgb8(0, 200, 0));
        assert_eq!(out.get(1, 1), Color::from_rgb8(100, 100, 0));
    }

    #[test]
    fn all_front_pose_blend_degrades_to_averaging() {
        let mut blender = TextureBlender::with_output_size(8);
        blender.add_image(uniform(8, Color::from_rgb8(200, 0, 0)), 1.0, HeadPose::Front);
        blender.add_image(uniform(8, Color::from_rgb8(0, 200, 0)), 1.0, HeadPose::Front);

        assert_eq!(blender.blend_pose_aware(), blender.blend());
    }

    #[test]
    fn pose_blend_prefers_sides_by_position() {
        let size = 100;
        let mut blender = TextureBlender::with_output_size(size);
        blender.add_image(uniform(size, Color::RED), 1.0, HeadPose::Front);
        blender.add_image(uniform(size, Color::GREEN), 1.0, HeadPose::Left);
        blender.add_image(uniform(size, Color::BLUE), 1.0, HeadPose::Right);

        let out = blender.blend_pose_aware().unwrap();

        // Center band: front texture only.
        assert_eq!(out.get(size / 2, 10), Color::RED);
        // Leftmost column: the right-pose texture (it shows the left face side).
        assert_eq!(out.get(0, 10), Color::BLUE);
        // Rightmost column: mostly the left-pose texture.
        let px = out.get(size - 1, 10);
        assert!(px.g() > 200, "got {px:?}");
    }
}
