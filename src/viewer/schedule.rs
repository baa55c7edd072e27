//! The spatially-interleaved load order.
//!
//! Loading left-to-right fills the screen like a fax machine; loading by
//! parity classes sprinkles tiles all over the image, so a coarse
//! approximation of the whole picture appears after the first quarter of
//! the work.

use crate::viewer::ChunkId;

/// The coordinate parities selected into each successive batch, as
/// `(x_parity, y_parity)`.
const PARITIES: [(u32, u32); 4] = [(1, 1), (0, 0), (1, 0), (0, 1)];

/// Partitions the `chunks_x × chunks_y` grid into four disjoint batches by
/// coordinate parity.
///
/// Their union is the full grid, each chunk appearing exactly once, and
/// within the first batch no two chunks are 4-neighbors. Batches are
/// row-major internally, so the order is stable for a given grid.
pub fn batches(chunks_x: u32, chunks_y: u32) -> [Vec<ChunkId>; 4] {
   PARITIES.map(|(x_parity, y_parity)| {
      let mut batch = Vec::new();
      for cy in (y_parity..chunks_y).step_by(2) {
         for cx in (x_parity..chunks_x).step_by(2) {
            batch.push((cx, cy));
         }
      }
      batch
   })
}
