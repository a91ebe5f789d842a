use thiserror::Error;

/// Library error type for slideshow mounting and markup loading.
#[derive(Debug, Error)]
pub enum Error {
    /// A required element is absent from the markup.
    #[error("missing required element `.{class}` inside {scope}")]
    MissingElement { class: String, scope: String },

    /// The markup is not well-formed XHTML.
    #[error("malformed markup at byte {position}: {message}")]
    Markup { position: u64, message: String },

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
