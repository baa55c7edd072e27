//! The gigaview core: a tiling pipeline for viewing very large raster
//! images.
//!
//! A source image is decoded once, sliced into fixed-size chunks, and
//! cached on disk as self-describing binary blobs. The chunk server hands
//! those blobs to the viewer, whose chunk manager uploads them into GPU
//! textures a few at a time, in a spatially-interleaved order that sketches
//! the whole image early.

pub mod cache;
pub mod codec;
pub mod config;
pub mod errors;
pub mod preprocess;
pub mod server;
pub mod viewer;

pub use errors::{Error, Result};
