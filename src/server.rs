//! The chunk server: the request surface between the backend and the
//! viewer.
//!
//! Both ends live in one process, so "IPC" here is a plain function call;
//! the server still behaves like a stateless request handler. Everything it
//! knows lives on disk and there is no per-session state to lose.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gigaview_protocol::metadata::Metadata;
use tokio::sync::Mutex;

use crate::cache::CacheStore;
use crate::errors::{Error, Result};
use crate::preprocess;
use crate::viewer::chunk_manager::ChunkSource;

/// Serves metadata and chunk blobs for preprocessed sources.
pub struct ChunkServer {
   store: CacheStore,
   chunk_size: u32,
   /// One lock per source path. Preprocess runs for the same source are
   /// serialized through these; distinct sources proceed in parallel.
   preprocess_locks: parking_lot::Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ChunkServer {
   /// Creates a server over the given store, using `chunk_size` as the
   /// nominal tile size for newly preprocessed sources.
   pub fn new(store: CacheStore, chunk_size: u32) -> Self {
      Self {
         store,
         chunk_size,
         preprocess_locks: parking_lot::Mutex::new(HashMap::new()),
      }
   }

   /// Returns the store the server reads from.
   pub fn store(&self) -> &CacheStore {
      &self.store
   }

   /// Resolves the canonical absolute form of a source path. Cache identity
   /// is keyed by it, so `./a.png` and `/images/a.png` cannot grow separate
   /// entries.
   fn canonicalize(path: &Path) -> Result<PathBuf> {
      path.canonicalize().map_err(|error| match error.kind() {
         io::ErrorKind::NotFound => Error::FileNotFound(path.to_owned()),
         _ => Error::Io(error),
      })
   }

   fn preprocess_lock(&self, source: &Path) -> Arc<Mutex<()>> {
      let mut locks = self.preprocess_locks.lock();
      Arc::clone(locks.entry(source.to_owned()).or_default())
   }

   /// Preprocesses the source if needed and returns its metadata by value.
   ///
   /// With `force`, the cache entry is rewritten even if a complete one
   /// exists.
   pub async fn process_source(&self, path: &Path, force: bool) -> Result<Metadata> {
      crate::codec::check_extension(path)?;
      let source = Self::canonicalize(path)?;
      let lock = self.preprocess_lock(&source);
      let _guard = lock.lock().await;
      preprocess::process(&self.store, &source, self.chunk_size, force).await
   }

   /// Returns the raw bytes of one chunk blob.
   ///
   /// Requires a complete cache entry; an incomplete or absent one fails
   /// with `NotPreprocessed`. The server does not preprocess on demand
   /// here, so chunk requests stay cheap and their failures stay
   /// predictable. Blob contents are returned as stored, unvalidated; the
   /// viewer checks the framing.
   pub async fn get_chunk(&self, path: &Path, cx: u32, cy: u32) -> Result<Vec<u8>> {
      let source = Self::canonicalize(path)?;
      if !self.store.is_complete(&source) {
         return Err(Error::NotPreprocessed);
      }
      Ok(tokio::fs::read(self.store.chunk_path(&source, cx, cy)).await?)
   }

   /// Removes the entire cache root.
   pub async fn clear_cache(&self) -> Result<()> {
      self.store.clear_all()
   }
}

impl ChunkSource for ChunkServer {
   async fn get_chunk(&self, source: &Path, cx: u32, cy: u32) -> Result<Vec<u8>> {
      ChunkServer::get_chunk(self, source, cx, cy).await
   }
}
