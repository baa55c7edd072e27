//! Viewer-side chunk loading: the per-chunk state machine, the bounded
//! request scheduler, and the hand-off to the GPU.
//!
//! All state transitions happen on the task that drives the manager; the
//! only thing that runs concurrently is the bounded set of in-flight chunk
//! fetches.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use futures_util::stream::{FuturesUnordered, StreamExt};
use gigaview_protocol::blob;
use gigaview_protocol::metadata::Metadata;
use gigaview_renderer::TextureBackend;

use crate::errors::{Error, Result};
use crate::viewer::{schedule, ChunkId};

/// Fetches raw chunk blobs across the backend boundary.
///
/// The chunk server implements this directly; tests substitute an in-memory
/// source.
#[allow(async_fn_in_trait)]
pub trait ChunkSource {
   /// Returns the raw bytes of the blob for chunk `(cx, cy)` of `source`.
   async fn get_chunk(&self, source: &Path, cx: u32, cy: u32) -> Result<Vec<u8>>;
}

/// The lifecycle stage of a single chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkStatus {
   /// Nothing has happened with the chunk yet.
   Unrequested,
   /// A fetch is in flight.
   Requesting,
   /// The blob arrived and parsed; the pixels sit in CPU memory awaiting
   /// upload.
   InCpu,
   /// The chunk lives in a GPU texture.
   InGpu,
   /// Fetching, parsing, or uploading failed. Terminal for the chunk.
   Error,
}

/// Viewer-side state of one chunk.
struct ChunkState<T> {
   status: ChunkStatus,
   /// Present only while the chunk is [`ChunkStatus::InCpu`].
   pixels: Option<Vec<u8>>,
   /// Present only while the chunk is [`ChunkStatus::InGpu`].
   texture: Option<T>,
   last_access: Instant,
}

impl<T> ChunkState<T> {
   fn new() -> Self {
      Self {
         status: ChunkStatus::Unrequested,
         pixels: None,
         texture: None,
         last_access: Instant::now(),
      }
   }
}

/// Counts of chunks per status, for progress UI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusStats {
   pub unrequested: usize,
   pub requesting: usize,
   pub in_cpu: usize,
   pub in_gpu: usize,
   pub error: usize,
}

type ReadyCallback = Box<dyn FnMut(ChunkId)>;

/// Tracks every chunk of one source and drives them towards the GPU.
pub struct ChunkManager<B: TextureBackend> {
   path: PathBuf,
   metadata: Metadata,
   states: HashMap<ChunkId, ChunkState<B::Texture>>,
   queue: VecDeque<ChunkId>,
   on_ready: Option<ReadyCallback>,
}

impl<B: TextureBackend> ChunkManager<B> {
   /// The maximum number of chunk fetches in flight at once.
   ///
   /// Deliberately small: it keeps the request boundary and the GPU upload
   /// path from saturating, and bounds the peak CPU-side pixel memory to
   /// `MAX_IN_FLIGHT` chunks plus the incoming blob.
   pub const MAX_IN_FLIGHT: usize = 3;

   /// Creates a manager for the given source, with one state per chunk of
   /// the metadata's grid.
   ///
   /// The metadata is validated up front; an inconsistent record fails here
   /// and no requests are ever issued for it.
   pub fn new(path: PathBuf, metadata: Metadata) -> Result<Self> {
      metadata
         .validate()
         .map_err(|error| Error::Io(io::Error::new(io::ErrorKind::InvalidData, error)))?;
      let states = metadata
         .chunks
         .iter()
         .map(|chunk| ((chunk.cx, chunk.cy), ChunkState::new()))
         .collect();
      Ok(Self {
         path,
         metadata,
         states,
         queue: VecDeque::new(),
         on_ready: None,
      })
   }

   /// Returns the metadata the manager was initialized with.
   pub fn metadata(&self) -> &Metadata {
      &self.metadata
   }

   /// Installs the callback invoked each time a chunk reaches the GPU.
   pub fn set_on_ready(&mut self, callback: impl FnMut(ChunkId) + 'static) {
      self.on_ready = Some(Box::new(callback));
   }

   /// Enqueues a chunk for loading.
   ///
   /// Idempotent: chunks that are already queued, in flight, loaded, or
   /// failed are left alone, as are IDs outside the grid.
   pub fn request(&mut self, id: ChunkId) {
      let Some(state) = self.states.get_mut(&id) else {
         tracing::warn!("request for chunk {:?} outside the grid", id);
         return;
      };
      if state.status != ChunkStatus::Unrequested || self.queue.contains(&id) {
         return;
      }
      state.last_access = Instant::now();
      self.queue.push_back(id);
   }

   /// Drives the queue until every queued chunk has settled, keeping at
   /// most [`Self::MAX_IN_FLIGHT`] fetches outstanding.
   ///
   /// Settling a chunk, successfully or not, frees its slot for the next
   /// queued ID, so the pipeline stays full without any timers.
   pub async fn process_queue<S: ChunkSource>(&mut self, source: &S, renderer: &mut B) {
      let mut in_flight = FuturesUnordered::new();
      loop {
         while in_flight.len() < Self::MAX_IN_FLIGHT {
            let Some(id) = self.queue.pop_front() else {
               break;
            };
            let Some(state) = self.states.get_mut(&id) else {
               continue;
            };
            if state.status != ChunkStatus::Unrequested {
               continue;
            }
            state.status = ChunkStatus::Requesting;
            state.last_access = Instant::now();
            let path = self.path.clone();
            in_flight.push(async move {
               let (cx, cy) = id;
               (id, source.get_chunk(&path, cx, cy).await)
            });
         }
         match in_flight.next().await {
            Some((id, result)) => self.settle(renderer, id, result),
            None => break,
         }
      }
   }

   /// Loads every chunk of the source, batch by spatial batch.
   ///
   /// Batch `k + 1` is not started until everything in batch `k` has
   /// settled; failed chunks stay failed and do not hold up their batch.
   pub async fn load_all<S: ChunkSource>(&mut self, source: &S, renderer: &mut B) {
      for batch in schedule::batches(self.metadata.chunks_x, self.metadata.chunks_y) {
         for id in batch {
            self.request(id);
         }
         self.process_queue(source, renderer).await;
      }
   }

   /// Finishes one settled fetch: parse, upload, notify. Any failure parks
   /// the chunk in the error state instead.
   fn settle(&mut self, renderer: &mut B, id: ChunkId, result: Result<Vec<u8>>) {
      match self.upload(renderer, id, result) {
         Ok(()) => {
            tracing::debug!("chunk {:?} is on the GPU", id);
            if let Some(on_ready) = self.on_ready.as_mut() {
               on_ready(id);
            }
         }
         Err(error) => {
            tracing::error!("chunk {:?} failed to load: [{}] {}", id, error.kind(), error);
            if let Some(state) = self.states.get_mut(&id) {
               // Entering the error state releases both the CPU and the GPU
               // copies of the chunk.
               state.pixels = None;
               state.texture = None;
               state.status = ChunkStatus::Error;
            }
         }
      }
   }

   fn upload(&mut self, renderer: &mut B, id: ChunkId, result: Result<Vec<u8>>) -> Result<()> {
      let mut data = result?;
      let (width, height) = {
         let parsed = blob::parse(&data)?;
         (parsed.width, parsed.height)
      };
      // The blob is the authority on its own dimensions; for edge tiles in
      // particular, its header overrides whatever the metadata declares.
      data.drain(..blob::HEADER_SIZE);

      let state = self.states.get_mut(&id).expect("settled chunk must have a state");
      state.pixels = Some(data);
      state.status = ChunkStatus::InCpu;
      state.last_access = Instant::now();

      let pixels = state.pixels.as_deref().expect("chunk in CPU memory holds pixels");
      let texture =
         renderer.create_texture_from_rgba(width, height, pixels).map_err(Error::GpuUpload)?;
      state.texture = Some(texture);
      // The CPU copy is dropped as soon as the upload returns.
      state.pixels = None;
      state.status = ChunkStatus::InGpu;
      Ok(())
   }

   /// Returns the status of one chunk, or `None` outside the grid.
   pub fn chunk_status(&self, id: ChunkId) -> Option<ChunkStatus> {
      self.states.get(&id).map(|state| state.status)
   }

   /// Returns the IDs of all chunks currently uploaded to the GPU, in
   /// row-major order.
   pub fn loaded_chunks(&self) -> Vec<ChunkId> {
      let mut loaded: Vec<ChunkId> = self
         .states
         .iter()
         .filter(|(_, state)| state.status == ChunkStatus::InGpu)
         .map(|(&id, _)| id)
         .collect();
      loaded.sort_unstable_by_key(|&(cx, cy)| (cy, cx));
      loaded
   }

   /// Counts the chunks in each status.
   pub fn status_stats(&self) -> StatusStats {
      let mut stats = StatusStats::default();
      for state in self.states.values() {
         match state.status {
            ChunkStatus::Unrequested => stats.unrequested += 1,
            ChunkStatus::Requesting => stats.requesting += 1,
            ChunkStatus::InCpu => stats.in_cpu += 1,
            ChunkStatus::InGpu => stats.in_gpu += 1,
            ChunkStatus::Error => stats.error += 1,
         }
      }
      stats
   }

   /// Releases every texture and clears all chunk state.
   pub fn cleanup(&mut self) {
      self.queue.clear();
      // Dropping the states drops their textures with them.
      self.states.clear();
   }
}
