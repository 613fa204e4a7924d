//! Drawing primitives over [`Image`].
//!
//! All routines alpha-blend the drawn color over the existing pixels (source-over, in sRGB
//! space, matching what 2D canvas compositing does), so semi-transparent overlay styles work as
//! expected.

use std::convert::Infallible;

use embedded_graphics::{
    pixelcolor::{raw::RawU32, PixelColor},
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, Triangle},
};

use crate::image::{Color, Image};

impl PixelColor for Color {
    type Raw = RawU32;
}

/// Draw target blending pixels onto an [`Image`]; out-of-bounds pixels are discarded.
struct Target<'a>(&'a mut Image);

impl OriginDimensions for Target<'_> {
    fn size(&self) -> Size {
        Size::new(self.0.width(), self.0.height())
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Infallible>
    where
        I: IntoIterator<Item = Pixel<Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0
                && point.y >= 0
                && (point.x as u32) < self.0.width()
                && (point.y as u32) < self.0.height()
            {
                let (x, y) = (point.x as u32, point.y as u32);
                let blended = source_over(self.0.get(x, y), color);
                self.0.set(x, y, blended);
            }
        }
        Ok(())
    }
}

fn source_over(dest: Color, src: Color) -> Color {
    let src_a = f32::from(src.a()) / 255.0;
    let dest_a = f32::from(dest.a()) / 255.0;
    let out_a = src_a + dest_a * (1.0 - src_a);
    if out_a == 0.0 {
        return Color::NONE;
    }

    let channel = |d: u8, s: u8| {
        let v = (f32::from(s) * src_a + f32::from(d) * dest_a * (1.0 - src_a)) / out_a;
        crate::num::to_channel(v)
    };

    Color([
        channel(dest.r(), src.r()),
        channel(dest.g(), src.g()),
        channel(dest.b(), src.b()),
        crate::num::to_channel(out_a * 255.0),
    ])
}

fn to_point(p: [f32; 2]) -> Point {
    Point::new(p[0].round() as i32, p[1].round() as i32)
}

/// Fills the triangle `(p0, p1, p2)` (pixel coordinates) with `color`.
pub fn fill_triangle(image: &mut Image, p0: [f32; 2], p1: [f32; 2], p2: [f32; 2], color: Color) {
    match Triangle::new(to_point(p0), to_point(p1), to_point(p2))
        .into_styled(PrimitiveStyle::with_fill(color))
        .draw(&mut Target(image))
    {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

/// Strokes the outline of the triangle `(p0, p1, p2)` with `color`.
pub fn stroke_triangle(
    image: &mut Image,
    p0: [f32; 2],
    p1: [f32; 2],
    p2: [f32; 2],
    color: Color,
    stroke_width: u32,
) {
    match Triangle::new(to_point(p0), to_point(p1), to_point(p2))
        .into_styled(PrimitiveStyle::with_stroke(color, stroke_width))
        .draw(&mut Target(image))
    {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

/// Draws a polyline through `points` (pixel coordinates) segment by segment.
pub fn polyline(image: &mut Image, points: &[[f32; 2]], color: Color, stroke_width: u32) {
    for segment in points.windows(2) {
        match Line::new(to_point(segment[0]), to_point(segment[1]))
            .into_styled(PrimitiveStyle::with_stroke(color, stroke_width))
            .draw(&mut Target(image))
        {
            Ok(_) => {}
            Err(infallible) => match infallible {},
        }
    }
}

/// Draws a filled circle centered at `center` (pixel coordinates).
pub fn fill_circle(image: &mut Image, center: [f32; 2], radius: u32, color: Color) {
    match Circle::with_center(to_point(center), radius * 2 + 1)
        .into_styled(PrimitiveStyle::with_fill(color))
        .draw(&mut Target(image))
    {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}
