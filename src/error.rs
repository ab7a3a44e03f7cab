use std::io;
use std::time::Duration;

use enough::StopReason;

use crate::classify::{Compression, FormatTag};
use crate::filter::FilterTimedOut;

/// Errors from classification, filtering, decoding and encoding.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum IngestError {
    #[error("i/o error: {0}")]
    Io(io::Error),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("unrecognized format magic bytes")]
    UnrecognizedFormat,

    #[error("format mismatch: expected {expected:?}, found {actual:?}")]
    FormatMismatch {
        expected: crate::PnmFormat,
        actual: crate::PnmFormat,
    },

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unsupported maxval {0} (expected 255 or 65535)")]
    InvalidMaxval(u32),

    #[error("invalid pixel data: {0}")]
    InvalidData(String),

    #[error("unsupported format variant: {0}")]
    UnsupportedVariant(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("pixel layout mismatch: expected {expected:?}, got {actual:?}")]
    LayoutMismatch {
        expected: crate::PixelLayout,
        actual: crate::PixelLayout,
    },

    #[error("failed to spawn filter `{command}`: {source}")]
    FilterSpawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("filter `{command}` produced no decodable output")]
    FilterOutput { command: String },

    #[error("filter `{command}` timed out after {timeout:?}")]
    FilterTimeout { command: String, timeout: Duration },

    #[error("no converter configured for {0:?}")]
    NoConverter(FormatTag),

    #[error("failed to start {compression:?} decompressor: {source}")]
    Decompress {
        compression: Compression,
        #[source]
        source: Box<IngestError>,
    },

    #[error("compressed containers nested deeper than {0}")]
    NestedCompression(usize),

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

impl From<StopReason> for IngestError {
    fn from(r: StopReason) -> Self {
        IngestError::Cancelled(r)
    }
}

impl From<io::Error> for IngestError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => IngestError::UnexpectedEof,
            io::ErrorKind::TimedOut => {
                match e.get_ref().and_then(|inner| inner.downcast_ref::<FilterTimedOut>()) {
                    Some(t) => IngestError::FilterTimeout {
                        command: t.command.clone(),
                        timeout: t.timeout,
                    },
                    None => IngestError::Io(e),
                }
            }
            _ => IngestError::Io(e),
        }
    }
}
