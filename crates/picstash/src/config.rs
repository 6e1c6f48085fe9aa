//! Layered configuration.
//!
//! Sources, lowest precedence first:
//! - Bundled defaults (include_str! from picstash.toml)
//! - `~/.config/picstash/picstash.toml`
//! - `./picstash.toml`
//! - `PICSTASH_*` environment variables, `__` between nesting levels
//!   (`PICSTASH_STORAGE__BACKEND=filesystem`)

use picstash_database::{InMemoryMetadataStore, MetadataStore};
use picstash_error::{ConfigError, PicstashError, PicstashResult};
use picstash_library::{ImageLibrary, LibraryConfig};
use picstash_storage::{BlobStore, FileSystemBlobStore, InMemoryBlobStore};
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Bundled default configuration.
const DEFAULT_CONFIG: &str = include_str!("../picstash.toml");

/// Blob store backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local map
    #[default]
    Memory,
    /// One file per blob under `storage.path`
    Filesystem,
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend to use
    pub backend: StorageBackend,
    /// Base directory for the filesystem backend
    pub path: Option<PathBuf>,
}

/// Metadata store backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// Process-local maps
    #[default]
    Memory,
    /// PostgreSQL via diesel (`postgres` feature)
    Postgres,
}

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Backend to use
    pub backend: DatabaseBackend,
    /// Connection URL for the postgres backend
    pub url: Option<String>,
    /// Maximum pooled connections
    pub pool_size: u32,
    /// Apply pending migrations when the library is built
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            url: None,
            pool_size: 10,
            run_migrations: true,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info", "picstash=debug")
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level picstash configuration.
///
/// # Example
///
/// ```no_run
/// use picstash::PicstashConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PicstashConfig::load()?;
/// let library = config.build_library()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PicstashConfig {
    /// Blob store settings
    pub storage: StorageConfig,
    /// Metadata store settings
    pub database: DatabaseConfig,
    /// Engine settings
    pub library: LibraryConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl PicstashConfig {
    /// Load configuration from every source, then validate it.
    ///
    /// User config files are optional and skipped when absent.
    #[instrument]
    pub fn load() -> PicstashResult<Self> {
        debug!("Loading configuration: env > current dir > home dir > bundled defaults");

        let mut builder = Self::bundled();

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/picstash/picstash.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("picstash").required(false))
            .add_source(
                Environment::with_prefix("PICSTASH")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = Self::finish(builder)?;
        config.validate()?;
        Ok(config)
    }

    /// Bundled defaults overlaid with a TOML document, then validated.
    ///
    /// Home, working-directory and environment sources are not consulted.
    pub fn from_toml_str(overrides: &str) -> PicstashResult<Self> {
        let builder = Self::bundled().add_source(File::from_str(overrides, FileFormat::Toml));
        let config = Self::finish(builder)?;
        config.validate()?;
        Ok(config)
    }

    fn bundled() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> PicstashResult<Self> {
        builder
            .build()
            .map_err(|e| {
                PicstashError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                PicstashError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })
    }

    /// Reject settings the library cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let library = &self.library;
        if *library.max_update_attempts() == 0 {
            return Err(ConfigError::new("library.max_update_attempts must be at least 1"));
        }
        if *library.default_page_size() == 0 {
            return Err(ConfigError::new("library.default_page_size must be at least 1"));
        }
        if library.max_page_size() < library.default_page_size() {
            return Err(ConfigError::new(format!(
                "library.max_page_size ({}) is smaller than library.default_page_size ({})",
                library.max_page_size(),
                library.default_page_size()
            )));
        }

        if self.storage.backend == StorageBackend::Filesystem && self.storage.path.is_none() {
            return Err(ConfigError::missing("storage.path", "the filesystem backend"));
        }

        if self.database.backend == DatabaseBackend::Postgres {
            if !cfg!(feature = "postgres") {
                return Err(ConfigError::new(
                    "database.backend = \"postgres\" requires the `postgres` feature",
                ));
            }
            if self.database.url.is_none() {
                return Err(ConfigError::missing("database.url", "the postgres backend"));
            }
            if self.database.pool_size == 0 {
                return Err(ConfigError::new("database.pool_size must be at least 1"));
            }
        }

        Ok(())
    }

    /// Construct an [`ImageLibrary`] over the configured backends.
    #[instrument(skip(self), fields(storage = ?self.storage.backend, database = ?self.database.backend))]
    pub fn build_library(&self) -> PicstashResult<ImageLibrary> {
        self.validate()?;

        let blobs: Arc<dyn BlobStore> = match self.storage.backend {
            StorageBackend::Memory => Arc::new(InMemoryBlobStore::new()),
            StorageBackend::Filesystem => {
                let path = self.storage.path.clone().ok_or_else(|| {
                    ConfigError::missing("storage.path", "the filesystem backend")
                })?;
                Arc::new(FileSystemBlobStore::new(path)?)
            }
        };

        let metadata: Arc<dyn MetadataStore> = match self.database.backend {
            DatabaseBackend::Memory => Arc::new(InMemoryMetadataStore::new()),
            DatabaseBackend::Postgres => self.postgres_store()?,
        };

        info!("Built image library from configuration");
        Ok(ImageLibrary::with_config(
            metadata,
            blobs,
            self.library.clone(),
        ))
    }

    #[cfg(feature = "postgres")]
    fn postgres_store(&self) -> PicstashResult<Arc<dyn MetadataStore>> {
        use picstash_database::{PostgresMetadataStore, establish_pool, run_migrations};

        let url = self.database.url.as_deref().ok_or_else(|| {
            ConfigError::missing("database.url", "the postgres backend")
        })?;
        let pool = establish_pool(url, self.database.pool_size)?;
        if self.database.run_migrations {
            run_migrations(&pool)?;
        }
        Ok(Arc::new(PostgresMetadataStore::new(pool)))
    }

    #[cfg(not(feature = "postgres"))]
    fn postgres_store(&self) -> PicstashResult<Arc<dyn MetadataStore>> {
        Err(ConfigError::new(
            "database.backend = \"postgres\" requires the `postgres` feature",
        )
        .into())
    }
}
