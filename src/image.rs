//! Pixel buffer types.
//!
//! This module provides the owned RGBA [`Image`] type used for texture extraction, blending and
//! mask rendering, along with the 8-bit [`Color`] value type. All images are 8-bit sRGB with
//! non-premultiplied alpha.

pub mod draw;
pub mod stats;

use std::{fmt, path::Path};

use anyhow::bail;
use image::{ImageBuffer, Rgba, RgbaImage};

/// An 8-bit RGBA color.
///
/// Colors are always in the non-linear sRGB color space and use non-premultiplied alpha.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct Color(pub(crate) [u8; 4]);

impl Color {
    /// Fully transparent black (all components are 0).
    pub const NONE: Self = Self([0, 0, 0, 0]);
    pub const BLACK: Self = Self([0, 0, 0, 255]);
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const RED: Self = Self([255, 0, 0, 255]);
    pub const GREEN: Self = Self([0, 255, 0, 255]);
    pub const BLUE: Self = Self([0, 0, 255, 255]);

    #[inline]
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b, 255])
    }

    #[inline]
    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self([r, g, b, a])
    }

    #[inline]
    pub fn r(&self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn g(&self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn b(&self) -> u8 {
        self.0[2]
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.0[3]
    }

    pub fn with_alpha(mut self, a: u8) -> Color {
        self.0[3] = a;
        self
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{:02x}{:02x}{:02x}{:02x}",
            self.r(),
            self.g(),
            self.b(),
            self.a(),
        )
    }
}

/// An 8-bit sRGB image with alpha channel.
#[derive(Clone, PartialEq)]
pub struct Image {
    buf: RgbaImage,
}

impl Image {
    /// Creates an empty image of a specified size.
    ///
    /// The image will start out black and fully transparent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: ImageBuffer::new(width, height),
        }
    }

    /// Loads an image from the filesystem.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn load<A: AsRef<Path>>(path: A) -> anyhow::Result<Self> {
        Self::load_impl(path.as_ref())
    }

    fn load_impl(path: &Path) -> anyhow::Result<Self> {
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("jpg" | "jpeg") => image::ImageFormat::Jpeg,
            Some("png") => image::ImageFormat::Png,
            _ => bail!(
                "invalid image path '{}' (must have one of the supported extensions)",
                path.display()
            ),
        };

        let data = std::fs::read(path)?;
        let buf = image::load_from_memory_with_format(&data, format)?.to_rgba8();
        Ok(Self { buf })
    }

    /// Saves an image to the file system.
    ///
    /// The path must have a supported file extension (`jpeg`, `jpg` or `png`).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        Ok(self.buf.save(path)?)
    }

    /// Returns the width of this image, in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    /// Returns the height of this image, in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Gets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn get(&self, x: u32, y: u32) -> Color {
        Color(self.buf[(x, y)].0)
    }

    /// Sets the image color at the given pixel coordinates.
    ///
    /// # Panics
    ///
    /// This will panic if `(x, y)` is outside the bounds of this image.
    pub fn set(&mut self, x: u32, y: u32, color: Color) {
        self.buf[(x, y)] = Rgba(color.0);
    }

    /// Fills the whole image with `color`.
    pub fn clear(&mut self, color: Color) {
        for pixel in self.buf.pixels_mut() {
            *pixel = Rgba(color.0);
        }
    }

    /// Resizes this image to a new size.
    ///
    /// For performance (as this runs on the CPU), this uses nearest neighbor interpolation, so
    /// the result won't look very good, but it suffices for texture-space buffers.
    pub fn resized_nearest(&self, width: u32, height: u32) -> Image {
        let mut out = Image::new(width, height);
        if self.width() == 0 || self.height() == 0 {
            return out;
        }

        for y in 0..height {
            for x in 0..width {
                let src_x = ((x as f32 + 0.5) / width as f32 * self.width() as f32) as u32;
                let src_y = ((y as f32 + 0.5) / height as f32 * self.height() as f32) as u32;
                let color = self.get(src_x.min(self.width() - 1), src_y.min(self.height() - 1));
                out.set(x, y, color);
            }
        }
        out
    }

    /// Raw RGBA data, row-major, 4 bytes per pixel.
    pub(crate) fn data(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Image({}x{})", self.width(), self.height())
    }
}
