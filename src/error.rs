//! Library error type

use thiserror::Error;

/// Errors raised by state persistence and the protocol bridge
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML element <{0}> is never closed")]
    UnclosedElement(String),

    #[error("XML document has no root element")]
    EmptyDocument,

    #[error("unexpected root element <{found}>, expected <{expected}>")]
    UnexpectedRoot { expected: String, found: String },

    #[error("invalid base64 image data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("OSC error: {0}")]
    Osc(String),
}

pub type Result<T> = std::result::Result<T, SurfaceError>;
