use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A required navbar element was not present in the document.
    #[error("missing element: #{0}")]
    MissingElement(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown abbreviation policy '{0}' (expected 'any' or 'acronym')")]
    InvalidPolicy(String),

    #[error("bind error: {0}")]
    Bind(String),
}

/// Convenience type alias for Results with the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
