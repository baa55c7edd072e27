//! The gigaview command line: preprocesses large raster images into the
//! chunk cache and inspects what is already there.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gigaview::cache::CacheStore;
use gigaview::config::UserConfig;
use gigaview::server::ChunkServer;
use gigaview::viewer::chunk_manager::ChunkManager;
use gigaview_renderer::TextureBackend;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gigaview", version)]
struct Cli {
   #[command(subcommand)]
   command: Commands,
}

#[derive(Subcommand)]
enum Commands {
   /// Decode an image and materialize its chunk cache entry
   Preprocess {
      /// The image file to preprocess
      path: PathBuf,
      /// Rewrite the cache entry even if a complete one exists
      #[arg(long)]
      force: bool,
   },
   /// Show the cached metadata of an image, without preprocessing it
   Info {
      /// The image file to look up
      path: PathBuf,
   },
   /// Load every chunk of an image through the viewer pipeline, without a
   /// real GPU attached, and report what settled where
   Verify {
      /// The image file to verify
      path: PathBuf,
   },
   /// Remove the entire chunk cache
   ClearCache,
}

struct NullTexture {
   width: u32,
   height: u32,
}

impl gigaview_renderer::Texture for NullTexture {
   fn size(&self) -> (u32, u32) {
      (self.width, self.height)
   }
}

/// Accepts uploads and throws them away. Stands in for the GPU when only
/// the fetch-parse-upload pipeline is being checked.
struct NullBackend;

impl TextureBackend for NullBackend {
   type Texture = NullTexture;

   fn create_texture_from_rgba(
      &mut self,
      width: u32,
      height: u32,
      _pixels: &[u8],
   ) -> anyhow::Result<NullTexture> {
      Ok(NullTexture { width, height })
   }
}

#[tokio::main]
async fn main() -> ExitCode {
   tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
      .init();

   let cli = Cli::parse();
   match run(cli).await {
      Ok(()) => ExitCode::SUCCESS,
      Err(error) => {
         eprintln!("error: {:#}", error);
         ExitCode::FAILURE
      }
   }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
   let config = UserConfig::load_or_create()?;
   let store = CacheStore::new(config.cache_dir());
   let server = ChunkServer::new(store.clone(), config.cache.chunk_size);

   match cli.command {
      Commands::Preprocess { path, force } => {
         let metadata = server.process_source(&path, force).await.map_err(report)?;
         println!(
            "{}x{} pixels in {} chunks ({}x{} grid, {} px nominal)",
            metadata.total_width,
            metadata.total_height,
            metadata.chunks.len(),
            metadata.chunks_x,
            metadata.chunks_y,
            metadata.chunk_size
         );
         println!("cache entry: {}", store.entry_dir(&path.canonicalize()?).display());
      }
      Commands::Info { path } => {
         let source = path.canonicalize().map_err(|_| {
            anyhow::anyhow!("file not found: {}", path.display())
         })?;
         if store.is_complete(&source) {
            let metadata = store.read_metadata(&source).map_err(report)?;
            println!(
               "{}x{} pixels in {} chunks ({}x{} grid, {} px nominal)",
               metadata.total_width,
               metadata.total_height,
               metadata.chunks.len(),
               metadata.chunks_x,
               metadata.chunks_y,
               metadata.chunk_size
            );
            println!("cache entry: {}", store.entry_dir(&source).display());
         } else {
            println!("{} is not preprocessed", path.display());
         }
      }
      Commands::Verify { path } => {
         let metadata = server.process_source(&path, false).await.map_err(report)?;
         let source = path.canonicalize()?;
         let mut backend = NullBackend;
         let mut manager = ChunkManager::new(source, metadata).map_err(report)?;
         manager.load_all(&server, &mut backend).await;
         let stats = manager.status_stats();
         println!("{} chunks loaded, {} failed", stats.in_gpu, stats.error);
         if stats.error > 0 {
            anyhow::bail!("{} chunks failed to load", stats.error);
         }
      }
      Commands::ClearCache => {
         server.clear_cache().await.map_err(report)?;
         println!("cache cleared");
      }
   }
   Ok(())
}

/// Attaches the machine-readable kind tag to an error leaving the core.
fn report(error: gigaview::Error) -> anyhow::Error {
   anyhow::anyhow!("[{}] {}", error.kind(), error)
}
