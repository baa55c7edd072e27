//! The machine-readable kind tag attached to errors that cross the
//! backend↔viewer boundary.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// The kind of a failure. Every error surfaced across the boundary carries
/// one of these alongside its human-readable message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
   /// The source path does not exist.
   FileNotFound,
   /// The source's extension is not in the supported set.
   UnsupportedFormat,
   /// The codec rejected the source.
   DecodeFailed,
   /// A read, write, or rename failed.
   IoError,
   /// A chunk was requested for a source without a complete cache entry.
   NotPreprocessed,
   /// A blob's header and body sizes are inconsistent.
   FramingError,
   /// Texture creation or upload failed.
   GpuUploadFailed,
}

impl Display for ErrorKind {
   fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
      f.write_str(match self {
         Self::FileNotFound => "file-not-found",
         Self::UnsupportedFormat => "unsupported-format",
         Self::DecodeFailed => "decode-failed",
         Self::IoError => "io-error",
         Self::NotPreprocessed => "not-preprocessed",
         Self::FramingError => "framing-error",
         Self::GpuUploadFailed => "gpu-upload-failed",
      })
   }
}
