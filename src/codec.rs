//! Decoding source images into raw RGBA pixel buffers.

use std::ffi::OsStr;
use std::path::Path;

use image::ImageError;

use crate::errors::{Error, Result};

/// The file extensions the preprocessor accepts.
///
/// The gate is advisory; the decoder is authoritative about whether the
/// file's contents are actually readable.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "webp"];

/// A source image, fully decoded into memory.
#[derive(Debug)]
pub struct DecodedImage {
   pub width: u32,
   pub height: u32,
   /// Row-major RGBA8, top-left origin, no stride padding, non-premultiplied
   /// alpha. Always exactly `width * height * 4` bytes.
   pub pixels: Vec<u8>,
}

/// Checks the extension gate for the given path.
///
/// This happens before any disk access, so an unsupported source fails
/// without touching the filesystem.
pub fn check_extension(path: &Path) -> Result<()> {
   let extension = path
      .extension()
      .and_then(OsStr::to_str)
      .map(str::to_lowercase)
      .unwrap_or_default();
   if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
      Ok(())
   } else {
      Err(Error::UnsupportedFormat { extension })
   }
}

/// Decodes the image at the given path into a contiguous RGBA8 buffer.
///
/// Never partially succeeds: either the whole image decodes, or an error is
/// returned and nothing is allocated for the caller.
pub fn decode(path: &Path) -> Result<DecodedImage> {
   check_extension(path)?;
   if !path.exists() {
      return Err(Error::FileNotFound(path.to_owned()));
   }

   let image = image::io::Reader::open(path)?.decode().map_err(decode_error)?.into_rgba8();
   let (width, height) = image.dimensions();
   tracing::debug!("decoded {:?}: {}x{}", path, width, height);
   Ok(DecodedImage {
      width,
      height,
      pixels: image.into_raw(),
   })
}

/// Splits the codec's error type into the I/O and decode halves of the
/// taxonomy.
fn decode_error(error: ImageError) -> Error {
   match error {
      ImageError::IoError(error) => Error::Io(error),
      other => Error::DecodeFailed(other),
   }
}

#[cfg(test)]
mod tests {
   use gigaview_protocol::error::ErrorKind;

   use super::*;

   #[test]
   fn extension_gate_accepts_the_supported_set() {
      for extension in SUPPORTED_EXTENSIONS {
         let path = format!("image.{}", extension);
         assert!(check_extension(Path::new(&path)).is_ok());
      }
      assert!(check_extension(Path::new("photo.JPG")).is_ok());
   }

   #[test]
   fn extension_gate_rejects_everything_else() {
      for path in ["notes.txt", "image.exr", "archive.tar.gz", "no_extension"] {
         let error = check_extension(Path::new(path)).unwrap_err();
         assert_eq!(error.kind(), ErrorKind::UnsupportedFormat);
      }
   }

   #[test]
   fn missing_file_is_not_a_decode_failure() {
      let error = decode(Path::new("/nonexistent/image.png")).unwrap_err();
      assert_eq!(error.kind(), ErrorKind::FileNotFound);
   }

   #[test]
   fn decode_produces_a_tightly_packed_buffer() {
      let dir = tempfile::tempdir().unwrap();
      let path = dir.path().join("gradient.png");
      let image = image::RgbaImage::from_fn(7, 5, |x, y| {
         image::Rgba([x as u8, y as u8, 0xaa, 0xff])
      });
      image.save(&path).unwrap();

      let decoded = decode(&path).unwrap();
      assert_eq!((decoded.width, decoded.height), (7, 5));
      assert_eq!(decoded.pixels.len(), 7 * 5 * 4);
      // Spot-check a pixel in the middle of a row.
      let offset = (2 * 7 + 3) * 4;
      assert_eq!(&decoded.pixels[offset..offset + 4], &[3, 2, 0xaa, 0xff]);
   }

   #[test]
   fn garbage_contents_fail_with_decode_failed() {
      let dir = tempfile::tempdir().unwrap();
      let path = dir.path().join("broken.png");
      std::fs::write(&path, b"this is not a png").unwrap();
      let error = decode(&path).unwrap_err();
      assert_eq!(error.kind(), ErrorKind::DecodeFailed);
   }
}
