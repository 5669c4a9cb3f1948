//! Error types for the HTTP server.

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding the listen address failed.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Address as configured (`host:port`).
        address: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Static file root is missing or not a directory.
    #[error("Static file root is not a directory: {}", .0.display())]
    RootNotFound(std::path::PathBuf),

    /// I/O error while serving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
