// The metadata record describing a tiled source image.

use serde::{Deserialize, Serialize};

/// The format version of a metadata record.
// The version is incremented whenever breaking changes are introduced in the record's layout.
pub const METADATA_VERSION: u32 = 1;

/// A single tile of the source image.
///
/// Tiles in the rightmost column and the bottom row may be smaller than the
/// nominal chunk size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
   /// The horizontal index of the chunk in the grid.
   pub cx: u32,
   /// The vertical index of the chunk in the grid.
   pub cy: u32,
   /// The X coordinate of the chunk's top-left pixel in the source image.
   pub x: u32,
   /// The Y coordinate of the chunk's top-left pixel in the source image.
   pub y: u32,
   /// The width of the chunk, in pixels.
   pub w: u32,
   /// The height of the chunk, in pixels.
   pub h: u32,
}

/// The metadata record of one preprocessed source image.
///
/// One record is persisted per cache entry. Its presence marks the entry as
/// committed; its `chunk_size` is the single source of truth for the chunk
/// grid, and viewers must not assume any default.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
   /// The format version of the record.
   pub version: u32,
   /// The width of the source image, in pixels.
   pub total_width: u32,
   /// The height of the source image, in pixels.
   pub total_height: u32,
   /// The nominal edge length of a chunk, in pixels.
   pub chunk_size: u32,
   /// The number of chunk columns.
   pub chunks_x: u32,
   /// The number of chunk rows.
   pub chunks_y: u32,
   /// All chunks of the grid, in row-major order.
   pub chunks: Vec<ChunkInfo>,
}

impl Metadata {
   /// Computes the chunk grid for an image of the given size.
   ///
   /// Both dimensions and the chunk size must be non-zero.
   pub fn compute(total_width: u32, total_height: u32, chunk_size: u32) -> Self {
      assert!(total_width > 0 && total_height > 0, "image must not be empty");
      assert!(chunk_size > 0, "chunk size must be non-zero");

      let chunks_x = total_width.div_ceil(chunk_size);
      let chunks_y = total_height.div_ceil(chunk_size);
      let mut chunks = Vec::with_capacity(chunks_x as usize * chunks_y as usize);
      for cy in 0..chunks_y {
         for cx in 0..chunks_x {
            let x = cx * chunk_size;
            let y = cy * chunk_size;
            chunks.push(ChunkInfo {
               cx,
               cy,
               x,
               y,
               w: chunk_size.min(total_width - x),
               h: chunk_size.min(total_height - y),
            });
         }
      }

      Self {
         version: METADATA_VERSION,
         total_width,
         total_height,
         chunk_size,
         chunks_x,
         chunks_y,
         chunks,
      }
   }

   /// Returns the chunk at the given grid indices, or `None` if the indices
   /// fall outside the grid.
   pub fn chunk(&self, cx: u32, cy: u32) -> Option<&ChunkInfo> {
      if cx >= self.chunks_x || cy >= self.chunks_y {
         return None;
      }
      self.chunks.get((cy * self.chunks_x + cx) as usize)
   }

   /// Checks the record's internal consistency: the grid dimensions must
   /// match the image size, and every chunk must sit where the grid formulas
   /// put it.
   pub fn validate(&self) -> Result<(), MetadataError> {
      if self.chunk_size == 0 {
         return Err(MetadataError::ZeroChunkSize);
      }
      if self.chunks_x != self.total_width.div_ceil(self.chunk_size)
         || self.chunks_y != self.total_height.div_ceil(self.chunk_size)
      {
         return Err(MetadataError::WrongGridSize);
      }
      if self.chunks.len() != self.chunks_x as usize * self.chunks_y as usize {
         return Err(MetadataError::WrongChunkCount);
      }
      for (index, chunk) in self.chunks.iter().enumerate() {
         let cx = index as u32 % self.chunks_x;
         let cy = index as u32 / self.chunks_x;
         let x = cx * self.chunk_size;
         let y = cy * self.chunk_size;
         let consistent = chunk.cx == cx
            && chunk.cy == cy
            && chunk.x == x
            && chunk.y == y
            && chunk.w == self.chunk_size.min(self.total_width - x)
            && chunk.h == self.chunk_size.min(self.total_height - y);
         if !consistent {
            return Err(MetadataError::BadChunk { cx, cy });
         }
      }
      Ok(())
   }
}

/// An error signalling an internally inconsistent metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataError {
   /// The nominal chunk size is zero.
   ZeroChunkSize,
   /// `chunks_x`/`chunks_y` do not match the image dimensions.
   WrongGridSize,
   /// The chunk list's length does not match the grid.
   WrongChunkCount,
   /// A chunk is not where the grid formulas put it.
   BadChunk { cx: u32, cy: u32 },
}

impl std::error::Error for MetadataError {}

impl std::fmt::Display for MetadataError {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      match self {
         Self::ZeroChunkSize => write!(f, "chunk size is zero"),
         Self::WrongGridSize => write!(f, "grid dimensions do not match the image size"),
         Self::WrongChunkCount => write!(f, "chunk list does not match the grid dimensions"),
         Self::BadChunk { cx, cy } => {
            write!(f, "chunk ({}, {}) does not match the grid formulas", cx, cy)
         }
      }
   }
}
