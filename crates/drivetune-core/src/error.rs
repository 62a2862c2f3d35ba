//! Error types for Drivetune core operations.
//!
//! Errors are grouped by domain (authentication, catalog access, cache, playback,
//! file system). The top-level [`Error`] wraps each domain enum and exposes an
//! [`ErrorKind`] so callers can branch on the category without matching every
//! variant.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad error category, used by front ends to pick a message or a recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credential rejected, missing, or interaction required.
    Auth,
    /// Transport-level failure talking to the catalog.
    Network,
    /// Malformed server response.
    Decode,
    /// A remote resource or download locator is missing.
    NotFound,
    /// Playback requested for an item that is not in the local cache.
    NotAvailableOffline,
    /// Cache write/delete or other local file failure.
    FileSystem,
    /// Invalid or unreadable configuration.
    Configuration,
    /// Media engine or queue misuse.
    Playback,
    /// Anything else.
    Internal,
}

/// Authentication errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The catalog rejected the presented credential.
    #[error("Credential rejected by server (HTTP {status})")]
    Rejected {
        /// HTTP status returned by the server.
        status: u16,
    },

    /// Silent token acquisition failed and the user has to sign in again.
    #[error("Interactive sign-in required")]
    InteractionRequired,

    /// No credential is available at all.
    #[error("No access token available")]
    MissingCredential,

    /// The identity provider failed for another reason.
    #[error("Identity provider error: {0}")]
    Provider(String),
}

/// Remote catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Transport failure.
    #[error("Network error requesting {url}: {reason}")]
    Network {
        /// Requested URL.
        url: String,
        /// Underlying reason.
        reason: String,
    },

    /// Response body could not be decoded.
    #[error("Failed to decode {context}: {reason}")]
    Decode {
        /// What was being decoded.
        context: String,
        /// Underlying reason.
        reason: String,
    },

    /// The remote resource does not exist.
    #[error("Remote resource not found: {resource}")]
    NotFound {
        /// Resource identifier or URL.
        resource: String,
    },

    /// The item metadata carried no download locator.
    #[error("No download URL available for item {item_id}")]
    NoDownloadUrl {
        /// Remote item id.
        item_id: String,
    },

    /// Unexpected HTTP status.
    #[error("Unexpected HTTP status {status} from {url}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },
}

/// Local cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The name cannot be used as a cache file name.
    #[error("Invalid cache entry name: {name:?}")]
    InvalidName {
        /// Offending name.
        name: String,
    },

    /// A staging file for an in-flight download could not be created.
    #[error("Failed to create staging file: {reason}")]
    StagingFailed {
        /// Underlying reason.
        reason: String,
    },
}

/// Playback errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The requested track has not been downloaded.
    #[error("\"{name}\" is not available offline")]
    NotAvailableOffline {
        /// Display name of the item.
        name: String,
    },

    /// The requested index is outside the queue.
    #[error("Index {index} is out of range for a queue of {len} item(s)")]
    InvalidIndex {
        /// Requested index.
        index: usize,
        /// Queue length.
        len: usize,
    },

    /// The media engine reported a failure.
    #[error("Media engine error: {0}")]
    Engine(String),

    /// The player task is no longer running.
    #[error("Player task has shut down")]
    PlayerClosed,
}

/// File system errors.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// Path does not exist.
    #[error("Path not found: {path}")]
    NotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// Read failed.
    #[error("Failed to read {path}: {reason}")]
    ReadFailed {
        /// Path being read.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Write failed.
    #[error("Failed to write {path}: {reason}")]
    WriteFailed {
        /// Path being written.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Directory creation failed.
    #[error("Failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// Directory path.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Delete failed.
    #[error("Failed to delete {path}: {reason}")]
    DeleteFailed {
        /// Path being deleted.
        path: PathBuf,
        /// Underlying reason.
        reason: String,
    },

    /// Move (rename or copy+remove) failed.
    #[error("Failed to move {source_path} to {destination}: {reason}")]
    MoveFailed {
        /// Source path.
        source_path: PathBuf,
        /// Destination path.
        destination: PathBuf,
        /// Underlying reason.
        reason: String,
    },
}

/// Errors that can occur in Drivetune core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Authentication failure.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Remote catalog failure.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Local cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Playback failure.
    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// File system failure.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Category of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(_) => ErrorKind::Auth,
            Self::Catalog(e) => match e {
                CatalogError::Network { .. } => ErrorKind::Network,
                CatalogError::Status { status, .. } if *status >= 500 => ErrorKind::Network,
                CatalogError::Status { .. } => ErrorKind::Internal,
                CatalogError::Decode { .. } => ErrorKind::Decode,
                CatalogError::NotFound { .. } | CatalogError::NoDownloadUrl { .. } => {
                    ErrorKind::NotFound
                }
            },
            Self::Cache(_) | Self::FileSystem(_) | Self::Io(_) => ErrorKind::FileSystem,
            Self::Playback(PlaybackError::NotAvailableOffline { .. }) => {
                ErrorKind::NotAvailableOffline
            }
            Self::Playback(_) => ErrorKind::Playback,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Serialization(_) => ErrorKind::Decode,
        }
    }

    /// Whether a manual retry of the same action could succeed.
    ///
    /// Nothing in the core retries on its own; this only informs the caller.
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network)
    }

    /// Whether the user has to sign in again before retrying.
    pub const fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            Self::Auth(
                AuthError::Rejected { .. }
                    | AuthError::InteractionRequired
                    | AuthError::MissingCredential
            )
        )
    }

    /// Short message suitable for showing to a user.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Auth => "Please sign in again.".to_string(),
            ErrorKind::Network => "Could not reach the server. Check your connection.".to_string(),
            ErrorKind::NotAvailableOffline => {
                "This track has not been downloaded for offline playback.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Extension trait for attaching a path to I/O results.
pub trait ErrorContext<T> {
    /// Map an I/O failure into a read error for `path`.
    fn read_context(self, path: &Path) -> Result<T>;

    /// Map an I/O failure into a write error for `path`.
    fn write_context(self, path: &Path) -> Result<T>;
}

impl<T> ErrorContext<T> for io::Result<T> {
    fn read_context(self, path: &Path) -> Result<T> {
        self.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                Error::FileSystem(FileSystemError::NotFound {
                    path: path.to_path_buf(),
                })
            } else {
                Error::FileSystem(FileSystemError::ReadFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        })
    }

    fn write_context(self, path: &Path) -> Result<T> {
        self.map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_not_available_offline_display() {
        let err = Error::from(PlaybackError::NotAvailableOffline {
            name: "song.mp3".to_string(),
        });
        assert_eq!(err.to_string(), "\"song.mp3\" is not available offline");
        assert_eq!(err.kind(), ErrorKind::NotAvailableOffline);
    }

    #[test]
    fn test_catalog_error_kinds() {
        let network = Error::from(CatalogError::Network {
            url: "https://example.invalid".to_string(),
            reason: "timed out".to_string(),
        });
        assert_eq!(network.kind(), ErrorKind::Network);
        assert!(network.is_retryable());

        let decode = Error::from(CatalogError::Decode {
            context: "listing".to_string(),
            reason: "expected value".to_string(),
        });
        assert_eq!(decode.kind(), ErrorKind::Decode);
        assert!(!decode.is_retryable());

        let missing = Error::from(CatalogError::NoDownloadUrl {
            item_id: "abc".to_string(),
        });
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_server_errors_are_retryable() {
        let err = Error::from(CatalogError::Status {
            status: 503,
            url: "u".to_string(),
        });
        assert!(err.is_retryable());

        let err = Error::from(CatalogError::Status {
            status: 418,
            url: "u".to_string(),
        });
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_auth_requires_sign_in() {
        let err = Error::from(AuthError::Rejected { status: 401 });
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert!(err.requires_sign_in());
        assert_eq!(err.user_message(), "Please sign in again.");

        let err = Error::from(AuthError::Provider("boom".to_string()));
        assert!(!err.requires_sign_in());
    }

    #[test]
    fn test_file_system_error_display() {
        let err = Error::FileSystem(FileSystemError::DeleteFailed {
            path: PathBuf::from("/cache/a.mp3"),
            reason: "permission denied".to_string(),
        });
        assert!(err.to_string().contains("/cache/a.mp3"));
        assert!(err.to_string().contains("permission denied"));
        assert_eq!(err.kind(), ErrorKind::FileSystem);
    }

    #[test]
    fn test_read_context_maps_not_found() {
        let res: io::Result<()> = Err(io::Error::new(io::ErrorKind::NotFound, "gone"));
        let err = res.read_context(Path::new("/x")).unwrap_err();
        assert!(matches!(
            err,
            Error::FileSystem(FileSystemError::NotFound { .. })
        ));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
