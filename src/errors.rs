//! The error taxonomy of the core.
//!
//! Every failure is fatal to the operation that produced it; nothing is
//! retried automatically. Errors that cross the backend↔viewer boundary
//! carry a machine-readable [`ErrorKind`] next to their message.

use std::path::PathBuf;

use gigaview_protocol::blob::FramingError;
use gigaview_protocol::error::ErrorKind;
use thiserror::Error;

/// An error produced by the preprocessing backend or the viewer.
#[derive(Debug, Error)]
pub enum Error {
   /// The source path does not exist.
   #[error("file not found: {}", .0.display())]
   FileNotFound(PathBuf),

   /// The source's extension is not in the supported set.
   ///
   /// This is only the advisory gate; a supported extension over unreadable
   /// contents fails with [`Error::DecodeFailed`] instead.
   #[error("unsupported image format: {extension:?}")]
   UnsupportedFormat { extension: String },

   /// The codec rejected the source.
   #[error("could not decode image: {0}")]
   DecodeFailed(image::ImageError),

   /// A read, write, or rename failed.
   #[error("I/O error: {0}")]
   Io(#[from] std::io::Error),

   /// A chunk was requested for a source that has no complete cache entry.
   #[error("source has not been preprocessed")]
   NotPreprocessed,

   /// A chunk blob's header and body sizes are inconsistent.
   #[error("malformed chunk blob: {0}")]
   Framing(#[from] FramingError),

   /// Texture creation or upload failed.
   #[error("GPU upload failed: {0}")]
   GpuUpload(anyhow::Error),
}

impl Error {
   /// Returns the machine-readable kind tag of the error.
   pub fn kind(&self) -> ErrorKind {
      match self {
         Self::FileNotFound(_) => ErrorKind::FileNotFound,
         Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
         Self::DecodeFailed(_) => ErrorKind::DecodeFailed,
         Self::Io(_) => ErrorKind::IoError,
         Self::NotPreprocessed => ErrorKind::NotPreprocessed,
         Self::Framing(_) => ErrorKind::FramingError,
         Self::GpuUpload(_) => ErrorKind::GpuUploadFailed,
      }
   }
}

pub type Result<T> = std::result::Result<T, Error>;
