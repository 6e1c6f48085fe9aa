//! Errors raised by the dedup engine itself.

/// Engine-level error conditions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum LibraryErrorKind {
    /// Referenced image record does not exist
    #[display("Image not found: {}", _0)]
    NotFound(String),
    /// Record is locked against file replacement and deletion
    #[display("Image {} is locked and cannot be deleted or modified", _0)]
    Locked(String),
    /// Payload rejected before touching any store
    #[display("Invalid input: {}", _0)]
    InvalidInput(String),
    /// Conditional update kept losing against concurrent writers
    #[display("Image {} was modified concurrently; giving up after {} attempts", id, attempts)]
    Conflict {
        /// Record identifier
        id: String,
        /// Attempts made before giving up
        attempts: u32,
    },
}

/// Engine error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Library Error: {} at line {} in {}", kind, line, file)]
pub struct LibraryError {
    /// The kind of error that occurred
    pub kind: LibraryErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl LibraryError {
    /// Create a new library error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: LibraryErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &LibraryErrorKind {
        &self.kind
    }
}
