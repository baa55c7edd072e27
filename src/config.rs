//! User configuration.

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

/// The nominal edge length of a chunk, in pixels, used when preprocessing
/// new sources. Existing cache entries keep whatever size their metadata
/// records; that record stays authoritative for its grid.
pub const DEFAULT_CHUNK_SIZE: u32 = 1024;

#[derive(Deserialize, Serialize)]
pub struct CacheConfig {
   /// Where the chunk cache lives. `None` picks a directory under the
   /// user's cache dir.
   pub dir: Option<PathBuf>,
   /// The nominal chunk size for newly preprocessed sources.
   pub chunk_size: u32,
}

#[derive(Deserialize, Serialize)]
pub struct UserConfig {
   pub cache: CacheConfig,
}

impl UserConfig {
   fn project_dirs() -> ProjectDirs {
      ProjectDirs::from("", "", "Gigaview").expect("cannot determine config directories")
   }

   pub fn config_dir() -> PathBuf {
      Self::project_dirs().config_dir().to_owned()
   }

   pub fn path() -> PathBuf {
      Self::config_dir().join("config.toml")
   }

   /// Loads the config file, creating a default one if it doesn't exist
   /// yet. An unreadable config falls back to the defaults rather than
   /// failing startup.
   pub fn load_or_create() -> anyhow::Result<Self> {
      let config_dir = Self::config_dir();
      let config_file = Self::path();
      std::fs::create_dir_all(config_dir)?;
      if !config_file.is_file() {
         let config = Self::default();
         config.save()?;
         Ok(config)
      } else {
         let file = std::fs::read_to_string(&config_file)?;
         let config = match toml::from_str(&file) {
            Ok(config) => config,
            Err(error) => {
               tracing::error!("error while deserializing config file: {}", error);
               tracing::error!("falling back to default config");
               Self::default()
            }
         };
         Ok(config)
      }
   }

   pub fn save(&self) -> anyhow::Result<()> {
      // Assumes that `config_dir` was already created in `load_or_create`.
      let config_file = Self::path();
      std::fs::write(&config_file, toml::to_string(self)?)?;
      Ok(())
   }

   /// Returns the directory the chunk cache lives in.
   pub fn cache_dir(&self) -> PathBuf {
      self
         .cache
         .dir
         .clone()
         .unwrap_or_else(|| Self::project_dirs().cache_dir().join("chunk_cache"))
   }
}

impl Default for UserConfig {
   fn default() -> Self {
      Self {
         cache: CacheConfig {
            dir: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
         },
      }
   }
}
