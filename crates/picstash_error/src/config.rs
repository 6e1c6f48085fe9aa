//! Errors raised while loading or validating picstash settings.

/// Invalid or unreadable picstash configuration, tagged with where it was
/// detected.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Invalid picstash configuration: {} ({}:{})", message, file, line)]
pub struct ConfigError {
    /// What is wrong, naming the offending `section.key` where there is one
    pub message: String,
    /// Line number where the error occurred
    pub line: u32,
    /// File where the error occurred
    pub file: &'static str,
}

impl ConfigError {
    /// Create a new ConfigError with the given message at the current location.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let location = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: location.line(),
            file: location.file(),
        }
    }

    /// A setting the selected backend cannot run without.
    ///
    /// # Examples
    ///
    /// ```
    /// use picstash_error::ConfigError;
    ///
    /// let err = ConfigError::missing("storage.path", "the filesystem backend");
    /// assert_eq!(err.message, "storage.path is required for the filesystem backend");
    /// ```
    #[track_caller]
    pub fn missing(key: &str, needed_by: &str) -> Self {
        Self::new(format!("{} is required for {}", key, needed_by))
    }
}
