//! The on-disk chunk cache.
//!
//! Each preprocessed source gets one entry directory under the cache root,
//! named by a digest of the source's absolute path. An entry holds the
//! `metadata` record plus one `chunk_{cx}_{cy}.bin` blob per chunk. The
//! metadata record is written last and atomically; its presence is what
//! commits the entry.
//!
//! Identity is the *path*, not the file contents. Overwriting a source file
//! in place without forcing a re-preprocess leaves the old entry in the
//! cache, and the viewer will happily render the stale pixels. That
//! trade-off keeps lookups stat-cheap; users who rewrite sources must force.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use gigaview_protocol::blob;
use gigaview_protocol::metadata::{Metadata, METADATA_VERSION};

use crate::errors::Result;

/// The file name of the metadata record inside an entry directory.
const METADATA_FILE: &str = "metadata";

/// The chunk cache: maps sources to entry directories and answers
/// completeness and path queries.
#[derive(Clone)]
pub struct CacheStore {
   root: PathBuf,
}

impl CacheStore {
   /// Creates a store rooted at the given directory.
   ///
   /// The directory itself is created lazily, by the first preprocess that
   /// writes into it.
   pub fn new(root: PathBuf) -> Self {
      Self { root }
   }

   /// Returns the cache root directory.
   pub fn root(&self) -> &Path {
      &self.root
   }

   /// Returns the entry directory name for the given source path.
   pub fn entry_name(source: &Path) -> String {
      format!("{:x}", md5::compute(source.to_string_lossy().as_bytes()))
   }

   /// Returns the entry directory for the given source.
   pub fn entry_dir(&self, source: &Path) -> PathBuf {
      self.root.join(Self::entry_name(source))
   }

   /// Returns the path of the source's metadata record.
   pub fn metadata_path(&self, source: &Path) -> PathBuf {
      self.entry_dir(source).join(METADATA_FILE)
   }

   /// Returns the path of one chunk blob of the source.
   pub fn chunk_path(&self, source: &Path, cx: u32, cy: u32) -> PathBuf {
      self.entry_dir(source).join(format!("chunk_{}_{}.bin", cx, cy))
   }

   /// Reads and parses the source's metadata record.
   ///
   /// Records from a newer format version than this build understands are
   /// treated as unreadable.
   pub fn read_metadata(&self, source: &Path) -> Result<Metadata> {
      let text = fs::read_to_string(self.metadata_path(source))?;
      let metadata: Metadata = toml::from_str(&text).map_err(invalid_data)?;
      if metadata.version > METADATA_VERSION {
         return Err(invalid_data(format!(
            "metadata version {} is newer than this build understands",
            metadata.version
         )));
      }
      Ok(metadata)
   }

   /// Atomically writes the source's metadata record, committing the entry.
   ///
   /// The record lands in a temporary file in the entry directory first and
   /// is renamed over the final name, so a crash mid-write never leaves a
   /// half-written record behind.
   pub fn write_metadata(&self, source: &Path, metadata: &Metadata) -> Result<()> {
      let text = toml::to_string(metadata).map_err(invalid_data)?;
      let mut file = tempfile::NamedTempFile::new_in(self.entry_dir(source))?;
      file.write_all(text.as_bytes())?;
      file.persist(self.metadata_path(source)).map_err(|error| error.error)?;
      Ok(())
   }

   /// Returns whether a complete entry exists for the given source.
   ///
   /// Complete means: the metadata record parses and validates, and every
   /// chunk blob exists with exactly the byte length its dimensions demand.
   /// Blob contents are never read. Any failure along the way answers
   /// `false`, never an error; partial entries are indistinguishable from
   /// absent ones.
   pub fn is_complete(&self, source: &Path) -> bool {
      let metadata = match self.read_metadata(source) {
         Ok(metadata) => metadata,
         Err(_) => return false,
      };
      if metadata.validate().is_err() {
         return false;
      }
      metadata.chunks.iter().all(|chunk| {
         fs::metadata(self.chunk_path(source, chunk.cx, chunk.cy))
            .map(|stat| stat.len() == blob::encoded_len(chunk.w, chunk.h))
            .unwrap_or(false)
      })
   }

   /// Creates the source's entry directory, emptying it first if it already
   /// exists. Also creates the cache root on first use.
   pub fn prepare_entry(&self, source: &Path) -> Result<PathBuf> {
      let entry = self.entry_dir(source);
      if entry.exists() {
         fs::remove_dir_all(&entry)?;
      }
      fs::create_dir_all(&entry)?;
      Ok(entry)
   }

   /// Removes the source's entry directory, if there is one.
   pub fn remove_entry(&self, source: &Path) -> Result<()> {
      let entry = self.entry_dir(source);
      match fs::remove_dir_all(&entry) {
         Ok(()) => Ok(()),
         Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
         Err(error) => Err(error.into()),
      }
   }

   /// Removes the cache root and everything beneath it.
   pub fn clear_all(&self) -> Result<()> {
      tracing::info!("clearing chunk cache at {:?}", self.root);
      match fs::remove_dir_all(&self.root) {
         Ok(()) => Ok(()),
         Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
         Err(error) => Err(error.into()),
      }
   }
}

fn invalid_data(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> crate::Error {
   io::Error::new(io::ErrorKind::InvalidData, error).into()
}
