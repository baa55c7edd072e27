//! The viewer side of the core: per-chunk state tracking, bounded chunk
//! fetching, and the spatially-interleaved load order.

pub mod chunk_manager;
pub mod schedule;

/// Grid indices identifying one chunk: `(cx, cy)`.
pub type ChunkId = (u32, u32);
