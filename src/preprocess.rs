//! The tiling preprocessor.
//!
//! Turns a source image into a committed cache entry: decode once, slice
//! into chunks, write one self-describing blob per chunk, then commit by
//! writing the metadata record. Blob writes fan out over a worker pool as
//! wide as the hardware; the metadata write happens strictly after all of
//! them, so an interrupted run can never masquerade as a complete entry.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use gigaview_protocol::blob;
use gigaview_protocol::metadata::{ChunkInfo, Metadata};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::CacheStore;
use crate::codec::{self, DecodedImage};
use crate::errors::{Error, Result};

/// Guarantees a complete cache entry for `source` and returns its metadata.
///
/// With `force`, any existing entry is removed first and rebuilt from
/// scratch. Without it, a complete entry short-circuits into a metadata
/// read and no pixel touches disk.
///
/// Concurrent calls for the same source must be serialized by the caller
/// (the chunk server holds a per-source lock); two unserialized calls race
/// on the entry directory.
pub async fn process(
   store: &CacheStore,
   source: &Path,
   chunk_size: u32,
   force: bool,
) -> Result<Metadata> {
   codec::check_extension(source)?;
   if !source.exists() {
      return Err(Error::FileNotFound(source.to_owned()));
   }

   if !force && store.is_complete(source) {
      tracing::debug!("cache hit for {:?}", source);
      return store.read_metadata(source);
   }
   if force {
      // Drop the old entry before doing any work, so that a crash from here
      // on leaves an incomplete (and therefore recoverable) entry rather
      // than a stale complete one.
      store.remove_entry(source)?;
   }

   let decoded = {
      let source = source.to_owned();
      tokio::task::spawn_blocking(move || codec::decode(&source)).await.map_err(join_error)??
   };
   let metadata = Metadata::compute(decoded.width, decoded.height, chunk_size);
   tracing::info!(
      "preprocessing {:?}: {}x{} into {}x{} chunks of {} px",
      source,
      metadata.total_width,
      metadata.total_height,
      metadata.chunks_x,
      metadata.chunks_y,
      metadata.chunk_size
   );

   store.prepare_entry(source)?;
   write_chunks(store, source, &metadata, decoded).await?;
   store.write_metadata(source, &metadata)?;
   tracing::debug!("committed cache entry {:?}", store.entry_dir(source));
   Ok(metadata)
}

/// Extracts every chunk from the decoded image and writes its blob file.
///
/// Writes are independent and unordered; a worker pool as wide as the
/// hardware parallelism runs the row-strided copies and file writes. On the
/// first failure no further chunks are started and the error surfaces
/// without the metadata record ever being written.
async fn write_chunks(
   store: &CacheStore,
   source: &Path,
   metadata: &Metadata,
   decoded: DecodedImage,
) -> Result<()> {
   let workers = std::thread::available_parallelism().map(usize::from).unwrap_or(1);
   let semaphore = Arc::new(Semaphore::new(workers));
   let pixels: Arc<[u8]> = decoded.pixels.into();

   let mut writes: JoinSet<Result<()>> = JoinSet::new();
   for &chunk in &metadata.chunks {
      let permit =
         Arc::clone(&semaphore).acquire_owned().await.expect("semaphore never closes");
      // Reap writes that have already settled, so that a failure stops the
      // fan-out instead of burning through the remaining chunks. Blobs
      // already in flight finish harmlessly; the missing metadata keeps the
      // entry incomplete.
      while let Some(joined) = writes.try_join_next() {
         joined.map_err(join_error)??;
      }
      let pixels = Arc::clone(&pixels);
      let total_width = metadata.total_width;
      let path = store.chunk_path(source, chunk.cx, chunk.cy);
      writes.spawn_blocking(move || {
         let result = write_chunk_blob(&path, &pixels, total_width, chunk);
         drop(permit);
         result
      });
   }

   while let Some(joined) = writes.join_next().await {
      joined.map_err(join_error)??;
   }
   Ok(())
}

/// Copies one chunk's pixels out of the full decoded buffer and writes the
/// framed blob. Each tile row is contiguous in the source, so the copy is
/// one slice per row.
fn write_chunk_blob(path: &Path, pixels: &[u8], total_width: u32, chunk: ChunkInfo) -> Result<()> {
   let mut data = Vec::with_capacity(blob::encoded_len(chunk.w, chunk.h) as usize);
   data.extend_from_slice(&blob::header(chunk.w, chunk.h));
   let row_bytes = chunk.w as usize * 4;
   for row in 0..chunk.h {
      let start = ((chunk.y + row) as usize * total_width as usize + chunk.x as usize) * 4;
      data.extend_from_slice(&pixels[start..start + row_bytes]);
   }
   fs::write(path, data)?;
   Ok(())
}

fn join_error(error: tokio::task::JoinError) -> Error {
   Error::Io(io::Error::new(io::ErrorKind::Other, error))
}
