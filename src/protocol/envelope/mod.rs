//! XML envelope codec for the vendor wire protocol
//!
//! Requests arrive as a single flat XML document per read; responses go out
//! as one flat `<RESPONSE>` document. The codec performs no I/O: `parse`
//! turns bytes into a [`Document`], [`ResponseBuilder`] renders ordered
//! `(tag, value)` pairs back to wire text.

mod codec;
mod response;

pub use self::codec::{Document, parse};
pub use self::response::ResponseBuilder;

use thiserror::Error;

/// Errors during envelope parsing
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// No start tag anywhere in the input
    #[error("no XML document in input")]
    NoDocument,

    /// Input is not valid UTF-8
    #[error("invalid UTF-8 in document")]
    InvalidUtf8,

    /// Structurally broken XML
    #[error("malformed document: {0}")]
    Malformed(String),
}
