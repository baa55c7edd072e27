//! The self-describing binary framing of a chunk blob.
//!
//! A blob is the on-disk and on-the-wire encoding of a single chunk:
//!
//! ```text
//! offset  size   field
//! 0       4      width  (big-endian u32)
//! 4       4      height (big-endian u32)
//! 8       w*h*4  RGBA pixels, row-major, top-left origin, non-premultiplied
//! ```
//!
//! The dimensions are redundant with the metadata record on purpose: a
//! mismatch between the two is detectable, and the viewer can size pixel
//! arrays from the blob alone.

/// The length of a blob header, in bytes.
pub const HEADER_SIZE: usize = 8;

/// Returns the header bytes for a chunk of the given dimensions.
pub fn header(width: u32, height: u32) -> [u8; HEADER_SIZE] {
   let mut bytes = [0; HEADER_SIZE];
   bytes[..4].copy_from_slice(&width.to_be_bytes());
   bytes[4..].copy_from_slice(&height.to_be_bytes());
   bytes
}

/// The expected total byte length of a blob with the given dimensions.
pub fn encoded_len(width: u32, height: u32) -> u64 {
   HEADER_SIZE as u64 + width as u64 * height as u64 * 4
}

/// A chunk blob, parsed but not copied out of its backing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blob<'a> {
   /// The width of the chunk, in pixels.
   pub width: u32,
   /// The height of the chunk, in pixels.
   pub height: u32,
   /// The chunk's RGBA pixels, exactly `width * height * 4` bytes.
   pub pixels: &'a [u8],
}

/// Parses and validates the framing of a chunk blob.
///
/// The payload length must agree exactly with the dimensions declared in the
/// header; any inconsistency is a [`FramingError`].
pub fn parse(data: &[u8]) -> Result<Blob<'_>, FramingError> {
   if data.len() < HEADER_SIZE {
      return Err(FramingError::TooShort { len: data.len() });
   }
   let width = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
   let height = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
   let payload = &data[HEADER_SIZE..];
   if payload.len() as u64 != width as u64 * height as u64 * 4 {
      return Err(FramingError::LengthMismatch {
         width,
         height,
         payload: payload.len(),
      });
   }
   Ok(Blob {
      width,
      height,
      pixels: payload,
   })
}

/// An error signalling that a blob's header and body sizes are inconsistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
   /// The blob is shorter than its fixed header.
   TooShort { len: usize },
   /// The payload length does not match the dimensions in the header.
   LengthMismatch { width: u32, height: u32, payload: usize },
}

impl std::error::Error for FramingError {}

impl std::fmt::Display for FramingError {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      match self {
         Self::TooShort { len } => {
            write!(f, "blob is {} bytes long, shorter than its header", len)
         }
         Self::LengthMismatch { width, height, payload } => write!(
            f,
            "blob header says {}x{} but the payload is {} bytes",
            width, height, payload
         ),
      }
   }
}
