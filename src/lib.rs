//! Omote: adaptive face mesh triangulation and face texture compositing.
//!
//! This library turns the landmark sets produced by an upstream face tracking model into
//! render-ready geometry and textures:
//!
//! - [`mesh::AdaptiveMesher`] triangulates a landmark set with region-aware level of detail:
//!   eyes, lips and nose keep dense geometry while cheeks and forehead are pruned or
//!   subdivided as needed.
//! - [`texture::TextureExtractor`] warps a face photo into a canonical UV texture, and
//!   [`texture::TextureBlender`] composites several such textures (optionally pose-aware).
//! - [`image::stats`] matches the color distribution of an extracted texture to a live target.
//! - [`mask::draw_mask`] rasterizes a mesh as a depth-shaded wireframe overlay.
//!
//! # Coordinates
//!
//! Landmarks use normalized image coordinates: X and Y in range 0.0 to 1.0 with the origin in
//! the top-left corner and Y pointing down, Z a normalized depth value. The landmark *order*
//! carries meaning: the first 468 entries follow the canonical face mesh topology described in
//! [`topology`]. Upstream landmark sources must deliver landmarks in exactly that order for the
//! static region and contour tables to resolve correctly.
//!
//! This crate performs no landmark detection of its own; the ML model supplying landmark sets
//! is an external collaborator.

use log::LevelFilter;

pub mod geom;
pub mod image;
pub mod landmark;
pub mod mask;
pub mod mesh;
pub mod num;
pub mod texture;
pub mod topology;


/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library will log at *debug* level; `RUST_LOG` can override the
/// configuration.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
