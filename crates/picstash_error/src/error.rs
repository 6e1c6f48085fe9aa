//! Top-level error wrapper types.

use crate::{
    ConfigError, DatabaseError, DatabaseErrorKind, LibraryError, LibraryErrorKind, StorageError,
    StorageErrorKind,
};

/// Every error the picstash crates can produce.
///
/// # Examples
///
/// ```
/// use picstash_error::{PicstashError, StorageError, StorageErrorKind};
///
/// let err: PicstashError = StorageError::new(StorageErrorKind::NotFound("k".into())).into();
/// assert!(format!("{}", err).contains("Blob not found"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum PicstashErrorKind {
    /// Dedup engine error
    #[from(LibraryError)]
    Library(LibraryError),
    /// Blob store error
    #[from(StorageError)]
    Storage(StorageError),
    /// Metadata store error
    #[from(DatabaseError)]
    Database(DatabaseError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
}

/// Coarse error taxonomy surfaced to the service shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ErrorClass {
    /// Referenced record or blob does not exist
    NotFound,
    /// Operation forbidden on a locked record
    Locked,
    /// Concurrent modification could not be resolved
    Conflict,
    /// A backing store failed
    StoreUnavailable,
    /// Payload rejected
    InvalidInput,
    /// Misconfiguration
    Config,
}

/// picstash error with kind discrimination.
///
/// # Examples
///
/// ```
/// use picstash_error::{ConfigError, PicstashResult};
///
/// fn might_fail() -> PicstashResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("picstash Error: {}", _0)]
pub struct PicstashError(Box<PicstashErrorKind>);

impl PicstashError {
    /// Create a new error from a kind.
    pub fn new(kind: PicstashErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &PicstashErrorKind {
        &self.0
    }

    /// Classify the error for callers that only care about its category.
    pub fn class(&self) -> ErrorClass {
        match self.kind() {
            PicstashErrorKind::Library(e) => match e.kind {
                LibraryErrorKind::NotFound(_) => ErrorClass::NotFound,
                LibraryErrorKind::Locked(_) => ErrorClass::Locked,
                LibraryErrorKind::InvalidInput(_) => ErrorClass::InvalidInput,
                LibraryErrorKind::Conflict { .. } => ErrorClass::Conflict,
            },
            PicstashErrorKind::Storage(e) => match e.kind {
                StorageErrorKind::NotFound(_) => ErrorClass::NotFound,
                StorageErrorKind::InvalidKey(_) => ErrorClass::InvalidInput,
                _ => ErrorClass::StoreUnavailable,
            },
            PicstashErrorKind::Database(e) => match e.kind {
                DatabaseErrorKind::NotFound(_) => ErrorClass::NotFound,
                DatabaseErrorKind::VersionConflict { .. } => ErrorClass::Conflict,
                _ => ErrorClass::StoreUnavailable,
            },
            PicstashErrorKind::Config(_) => ErrorClass::Config,
        }
    }
}

// Generic From implementation for any type that converts to PicstashErrorKind
impl<T> From<T> for PicstashError
where
    T: Into<PicstashErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for picstash operations.
pub type PicstashResult<T> = std::result::Result<T, PicstashError>;
