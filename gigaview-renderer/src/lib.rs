//! The rendering contract between the viewer core and a GPU backend.
//!
//! The core never talks to a graphics API directly; it hands finished RGBA
//! pixel arrays to a [`TextureBackend`] and keeps the returned texture
//! handles. Concrete backends live outside this repository.

/// A 2D texture living on the GPU.
///
/// Dropping a texture releases its GPU memory.
pub trait Texture {
   /// Returns the size of the texture.
   fn size(&self) -> (u32, u32);

   /// Returns the width of the texture.
   fn width(&self) -> u32 {
      self.size().0
   }

   /// Returns the height of the texture.
   fn height(&self) -> u32 {
      self.size().1
   }
}

/// A backend that can create textures from raw pixel data.
pub trait TextureBackend {
   type Texture: Texture;

   /// Creates a new 2D texture of the given size from RGBA pixel data.
   ///
   /// `pixels` holds exactly `width * height * 4` bytes of row-major,
   /// top-left-origin, non-premultiplied RGBA.
   ///
   /// # Implementation notes
   ///
   /// The texture is uploaded at mip level 0 only, with nearest filtering
   /// and clamp-to-edge wrapping. Backends must not keep a reference to
   /// `pixels` beyond this call; the caller frees the buffer as soon as the
   /// upload returns.
   fn create_texture_from_rgba(
      &mut self,
      width: u32,
      height: u32,
      pixels: &[u8],
   ) -> anyhow::Result<Self::Texture>;
}
