use thiserror::Error;

// === StoreError ===

/// Errors reported by a remote store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached or refused to serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// The backing database failed.
    #[error("Store database error: {0}")]
    DatabaseError(String),
    /// The row does not exist in the caller's owner scope.
    #[error("Record not found: {0}")]
    NotFound(String),
    /// The session was rejected by the store's row-level scoping.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// A stored row could not be decoded.
    #[error("Malformed row: {0}")]
    MalformedRow(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

// === BookmarkError ===

/// Errors surfaced by the bookmark reconciler to its caller.
#[derive(Debug, Error)]
pub enum BookmarkError {
    /// No session, or the session expired. The caller should re-authenticate.
    #[error("Not authenticated")]
    Unauthenticated,
    /// The reconciler is not active (no subscription, no owner scope).
    #[error("Reconciler is not active")]
    Inactive,
    /// The draft is missing a required field.
    #[error("Invalid bookmark: {0}")]
    InvalidDraft(String),
    /// Bookmark with the given ID is not in the collection.
    #[error("Bookmark not found: {0}")]
    NotFound(String),
    /// The bookmark is still waiting for the store to confirm its insert.
    #[error("Bookmark not confirmed yet: {0}")]
    NotConfirmed(String),
    /// The remote store call failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// === MetadataError ===

/// Errors raised while fetching page metadata. Logged, then reported as empty metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Only http and https URLs are fetched.
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),
    /// The request failed before a response arrived.
    #[error("Metadata network error: {0}")]
    NetworkError(String),
    /// The page answered with a non-success status.
    #[error("Metadata HTTP status: {0}")]
    HttpStatus(u16),
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}
