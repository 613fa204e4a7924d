//! Color statistics and color transfer between pixel populations.
//!
//! These routines drive the color matching step of the texture pipeline: the color distribution
//! of an extracted face texture is rescaled to match the live target face so the swapped texture
//! does not visibly differ in skin tone or lighting.

use crate::geom::point_in_polygon;
use crate::image::Image;
use crate::num::to_channel;

/// Alpha value a pixel must exceed to count towards color statistics.
const VISIBLE_ALPHA: u8 = 128;

/// Per-channel mean and standard deviation of a pixel population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStats {
    /// Mean R/G/B channel values, in `0.0..=255.0`.
    pub mean: [f32; 3],
    /// R/G/B channel standard deviations.
    pub std_dev: [f32; 3],
}

impl ColorStats {
    /// The statistics reported for an empty pixel population.
    ///
    /// Mid-gray with a moderate spread; using this instead of zeros keeps downstream transfers
    /// well-defined when no pixels qualify.
    pub const NEUTRAL: Self = Self {
        mean: [128.0; 3],
        std_dev: [50.0; 3],
    };
}

/// Computes color statistics over all pixels with alpha above 128.
///
/// Returns [`ColorStats::NEUTRAL`] when no pixel qualifies.
pub fn analyze_colors(image: &Image) -> ColorStats {
    accumulate(
        image
            .data()
            .chunks_exact(4)
            .filter(|px| px[3] > VISIBLE_ALPHA),
    )
}

/// Computes color statistics over the pixels whose centers lie inside `polygon`.
///
/// The polygon is given in normalized image coordinates (the landmark coordinate space), so a
/// face-oval polygon built from landmarks can be used directly. Alpha is ignored; membership in
/// the polygon alone selects the population. Returns [`ColorStats::NEUTRAL`] when no pixel
/// qualifies.
pub fn analyze_region(image: &Image, polygon: &[[f32; 2]]) -> ColorStats {
    let width = image.width();
    let height = image.height();

    accumulate(
        image
            .data()
            .chunks_exact(4)
            .enumerate()
            .filter(|(i, _)| {
                let x = (i % width as usize) as f32;
                let y = (i / width as usize) as f32;
                let point = [(x + 0.5) / width as f32, (y + 0.5) / height as f32];
                point_in_polygon(point, polygon)
            })
            .map(|(_, px)| px),
    )
}

fn accumulate<'a>(pixels: impl Iterator<Item = &'a [u8]>) -> ColorStats {
    let mut sum = [0.0f64; 3];
    let mut sq_sum = [0.0f64; 3];
    let mut count = 0u64;

    for px in pixels {
        for channel in 0..3 {
            let v = f64::from(px[channel]);
            sum[channel] += v;
            sq_sum[channel] += v * v;
        }
        count += 1;
    }

    if count == 0 {
        return ColorStats::NEUTRAL;
    }

    let mut mean = [0.0f32; 3];
    let mut std_dev = [0.0f32; 3];
    for channel in 0..3 {
        let m = sum[channel] / count as f64;
        mean[channel] = m as f32;
        // Clamp against tiny negative values from float cancellation.
        std_dev[channel] = (sq_sum[channel] / count as f64 - m * m).max(0.0).sqrt() as f32;
    }

    ColorStats { mean, std_dev }
}

/// Rescales the image's color distribution from `source` statistics to `target` statistics.
///
/// Each channel is transformed as `(value - source_mean) * (target_std / source_std) +
/// target_mean`, clamped to `0..=255`. Channels whose source standard deviation is 0 keep a
/// ratio of 1 so flat colors shift instead of blowing up. Only pixels with non-zero alpha are
/// touched, and the alpha channel itself is never modified.
pub fn apply_color_transfer(image: &mut Image, source: &ColorStats, target: &ColorStats) {
    let mut ratio = [1.0f32; 3];
    for channel in 0..3 {
        if source.std_dev[channel] > 0.0 {
            ratio[channel] = target.std_dev[channel] / source.std_dev[channel];
        }
    }

    for px in image.data_mut().chunks_exact_mut(4) {
        if px[3] == 0 {
            continue;
        }
        for channel in 0..3 {
            let v = (f32::from(px[channel]) - source.mean[channel]) * ratio[channel]
                + target.mean[channel];
            px[channel] = to_channel(v);
        }
    }
}

/// Returns the mean brightness `(r + g + b) / 3` of all pixels with alpha above 128, or `128.0`
/// when no pixel qualifies.
pub fn mean_brightness(image: &Image) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0u64;
    for px in image.data().chunks_exact(4) {
        if px[3] > VISIBLE_ALPHA {
            sum += f64::from(u32::from(px[0]) + u32::from(px[1]) + u32::from(px[2])) / 3.0;
            count += 1;
        }
    }

    if count == 0 {
        128.0
    } else {
        (sum / count as f64) as f32
    }
}

/// Shifts all channels by a flat offset so the image's mean brightness matches `target`.
pub fn match_brightness(image: &mut Image, target: f32) {
    let adjustment = target - mean_brightness(image);
    for px in image.data_mut().chunks_exact_mut(4) {
        if px[3] == 0 {
            continue;
        }
        for channel in 0..3 {
            px[channel] = to_channel(f32::from(px[channel]) + adjustment);
        }
    }
}

/// Softens mask edges by Gaussian-blurring the alpha channel.
///
/// RGB channels are untouched, and only pixels whose original alpha is strictly between 0 and
/// 255 (i.e. actual edge pixels) receive the blurred value, so fully opaque interiors and fully
/// transparent exteriors keep hard values. The blur is a standard separable 2-pass convolution
/// with a normalized kernel of the given radius.
pub fn feather_edges(image: &mut Image, radius: u32) {
    if radius == 0 || image.width() == 0 || image.height() == 0 {
        return;
    }

    let width = image.width() as usize;
    let height = image.height() as usize;
    let r = radius as i64;

    let mut kernel = Vec::with_capacity(radius as usize * 2 + 1);
    let mut kernel_sum = 0.0f32;
    for i in -r..=r {
        let v = (-((i * i) as f32) / (2.0 * (r * r) as f32)).exp();
        kernel.push(v);
        kernel_sum += v;
    }
    for v in &mut kernel {
        *v /= kernel_sum;
    }

    let alpha = image
        .data()
        .chunks_exact(4)
        .map(|px| f32::from(px[3]))
        .collect::<Vec<_>>();

    // Horizontal pass, then vertical pass, clamping samples at the borders.
    let mut temp = vec![0.0f32; alpha.len()];
    for y in 0..height {
        for x in 0..width {
            let mut v = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x as i64 + k as i64 - r).clamp(0, width as i64 - 1) as usize;
                v += alpha[y * width + sx] * weight;
            }
            temp[y * width + x] = v;
        }
    }
    let mut blurred = vec![0.0f32; alpha.len()];
    for y in 0..height {
        for x in 0..width {
            let mut v = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y as i64 + k as i64 - r).clamp(0, height as i64 - 1) as usize;
                v += temp[sy * width + x] * weight;
            }
            blurred[y * width + x] = v;
        }
    }

    for (i, px) in image.data_mut().chunks_exact_mut(4).enumerate() {
        if px[3] > 0 && px[3] < 255 {
            px[3] = to_channel(blurred[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::image::Color;

    use super::*;

    fn noisy_image(width: u32, height: u32) -> Image {
        let mut rng = fastrand::Rng::with_seed(0x1dea11);
        let mut image = Image::new(width, height);
        for y in 0..height {
            for x in 0..width {
                image.set(
                    x,
                    y,
                    Color::from_rgba8(rng.u8(..), rng.u8(..), rng.u8(..), 255),
                );
            }
        }
        image
    }

    #[test]
    fn empty_population_reports_neutral_stats() {
        let image = Image::new(8, 8); // fully transparent
        assert_eq!(analyze_colors(&image), ColorStats::NEUTRAL);
    }

    #[test]
    fn uniform_image_has_zero_std_dev() {
        let mut image = Image::new(4, 4);
        image.clear(Color::from_rgb8(10, 20, 30));

        let stats = analyze_colors(&image);
        assert_eq!(stats.mean, [10.0, 20.0, 30.0]);
        assert_eq!(stats.std_dev, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn transfer_with_identical_stats_is_identity() {
        let mut image = noisy_image(16, 16);
        let original = image.clone();
        let stats = analyze_colors(&image);

        apply_color_transfer(&mut image, &stats, &stats);
        assert_eq!(image, original);
    }

    #[test]
    fn transfer_with_zero_source_std_shifts_by_mean() {
        let mut image = Image::new(2, 2);
        image.clear(Color::from_rgb8(100, 100, 100));
        let source = analyze_colors(&image);

        let target = ColorStats {
            mean: [150.0, 50.0, 100.0],
            std_dev: [50.0; 3],
        };
        apply_color_transfer(&mut image, &source, &target);
        assert_eq!(image.get(0, 0), Color::from_rgb8(150, 50, 100));
    }

    #[test]
    fn transfer_leaves_alpha_untouched() {
        let mut image = Image::new(2, 1);
        image.set(0, 0, Color::from_rgba8(200, 0, 0, 77));
        image.set(1, 0, Color::from_rgba8(0, 0, 0, 0));

        let target = ColorStats {
            mean: [0.0; 3],
            std_dev: [10.0; 3],
        };
        apply_color_transfer(&mut image, &ColorStats::NEUTRAL, &target);
        assert_eq!(image.get(0, 0).a(), 77);
        assert_eq!(image.get(1, 0), Color::NONE);
    }

    #[test]
    fn region_stats_select_by_polygon() {
        let mut image = Image::new(10, 10);
        image.clear(Color::from_rgb8(0, 0, 0));
        // Left half white.
        for y in 0..10 {
            for x in 0..5 {
                image.set(x, y, Color::WHITE);
            }
        }

        let left_half = [[0.0, 0.0], [0.5, 0.0], [0.5, 1.0], [0.0, 1.0]];
        let stats = analyze_region(&image, &left_half);
        assert_eq!(stats.mean, [255.0; 3]);
        assert_eq!(stats.std_dev, [0.0; 3]);
    }

    #[test]
    fn brightness_matching_shifts_flat_images_exactly() {
        let mut image = Image::new(4, 4);
        image.clear(Color::from_rgb8(100, 110, 120));
        assert_relative_eq!(mean_brightness(&image), 110.0, epsilon = 1e-4);

        match_brightness(&mut image, 140.0);
        assert_eq!(image.get(0, 0), Color::from_rgb8(130, 140, 150));
    }

    #[test]
    fn feather_preserves_rgb_and_uniform_alpha() {
        let mut image = noisy_image(8, 8);
        let original = image.clone();

        feather_edges(&mut image, 2);
        // All alphas are 255, so nothing may change at all.
        assert_eq!(image, original);
    }

    #[test]
    fn feather_softens_edge_alpha_only() {
        let mut image = Image::new(3, 1);
        image.set(0, 0, Color::from_rgba8(10, 20, 30, 255));
        image.set(1, 0, Color::from_rgba8(40, 50, 60, 200));
        image.set(2, 0, Color::from_rgba8(70, 80, 90, 0));

        feather_edges(&mut image, 1);

        // Only the middle pixel has an intermediate alpha; its RGB stays fixed.
        assert_eq!(image.get(0, 0), Color::from_rgba8(10, 20, 30, 255));
        assert_eq!(image.get(2, 0), Color::from_rgba8(70, 80, 90, 0));
        let edge = image.get(1, 0);
        assert_eq!((edge.r(), edge.g(), edge.b()), (40, 50, 60));
        assert!(edge.a() < 200, "edge alpha must be pulled down by the blur");
    }
}
