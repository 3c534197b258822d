//! Decodes TVPaint's proprietary `.tvpp` project container: a hierarchical
//! binary file holding multi-scene, multi-clip, multi-layer raster
//! animation projects. Given a path, this crate exposes the project's
//! metadata tree and, for any (scene, clip, layer, frame) coordinate,
//! reconstructs a full RGBA raster for that frame.
//!
//! The interesting engineering is the tile-reference resolver
//! ([`image::resolve`]): producing a materialized frame means chasing
//! chains of cross-image and intra-image tile references with well-defined
//! termination rules. See [`doc::layer::Layer::frame`].

mod binreader;
mod container;
mod dict;
pub mod doc;
mod error;
mod image;
pub(crate) mod rle;
mod zchk;

pub use dict::Dict;
pub use doc::{
    clip::Clip,
    layer::{Layer, LayerSettings},
    Project, Version,
};
pub use error::{Error, FormatError, Result};
