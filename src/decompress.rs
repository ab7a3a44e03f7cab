//! Transparent decompression of gzip/compress/pack/bzip2 wrapped input.

use std::fs::File;
use std::path::Path;

use crate::classify::{self, Classification, Compression, FormatTag};
use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::filter::{self, FilterInput};
use crate::source::ByteSource;

/// How a decompressor was fed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecompressMode {
    /// Given the file on disk as its stdin.
    Path,
    /// Fed the remaining bytes of the source by a relay thread.
    Stream,
}

/// A source with every compression layer removed.
#[derive(Debug)]
pub struct Decompressed {
    pub source: ByteSource,
    /// Classification of the innermost content. Never `Compressed`.
    pub classification: Classification,
    /// Layers removed, outermost first.
    pub layers: Vec<(Compression, DecompressMode)>,
}

/// Classify `source`, unwrapping compressed containers until the content
/// is something else.
///
/// The outermost layer of a file still at its first byte is decompressed
/// straight from disk; everything else is relayed through the filter.
pub fn decompress_if_needed(
    mut source: ByteSource,
    path_hint: Option<&Path>,
    config: &PipelineConfig,
) -> Result<Decompressed, IngestError> {
    let filter_config = config.filter_config();
    let mut layers = Vec::new();
    loop {
        let classification = classify::classify(&mut source);
        let FormatTag::Compressed(compression) = classification.tag else {
            return Ok(Decompressed {
                source,
                classification,
                layers,
            });
        };
        if layers.len() >= config.max_decompress_depth {
            return Err(IngestError::NestedCompression(config.max_decompress_depth));
        }

        let command = config.decompressor(compression);
        let wrap = |e: IngestError| IngestError::Decompress {
            compression,
            source: Box::new(e),
        };
        let path = if layers.is_empty() && source.position() == 0 {
            path_hint.or(source.path()).map(Path::to_path_buf)
        } else {
            None
        };
        let (next, mode) = match path {
            Some(path) => {
                let file = File::open(&path).map_err(|e| wrap(e.into()))?;
                drop(source);
                let process = filter::spawn(command, FilterInput::File(file), &filter_config)
                    .map_err(wrap)?;
                (ByteSource::from_reader(process), DecompressMode::Path)
            }
            None => (
                filter::run_filter(source, command, &filter_config).map_err(wrap)?,
                DecompressMode::Stream,
            ),
        };
        log::debug!(
            "decompress: {compression:?} layer {} via `{command}` ({mode:?})",
            layers.len() + 1
        );
        layers.push((compression, mode));
        source = next;
    }
}
