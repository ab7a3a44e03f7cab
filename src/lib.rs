//! # zeningest
//!
//! Image ingestion: identify a byte stream, strip compression, convert
//! foreign formats with external tools, and decode PBM/PGM/PPM into a
//! [`Raster`].
//!
//! ## Pipeline
//!
//! 1. [`classify`] sniffs the first line of a [`ByteSource`] and pushes back
//!    everything it looked at.
//! 2. [`decompress_if_needed`] runs `gzip`/`bzip2` as filters for as long as
//!    the content is still a compressed container.
//! 3. Raster containers (GIF, JPEG, TIFF, PNG, BMP, ...) and PostScript are
//!    piped through a converter that emits PNM ([`run_filter`]).
//! 4. The PNM codec decodes the whole image or any [`Region`] of it.
//!
//! [`Ingest`] chains these steps; each is also usable on its own.
//!
//! ## PNM support
//!
//! - **P1/P4** (PBM), **P2/P5** (PGM), **P3/P6** (PPM), ASCII and binary
//! - maxval 255 or 65535 (PBM implied 1); 16-bit samples read big-endian
//! - Region decode seeks to the requested rows instead of reading the file
//! - Tiled files (a `# tile <w> <h>` header comment) written by
//!   [`write_tiled`] decode regions tile by tile
//!
//! Rasters store rows bottom-up: row 0 is the bottom scanline.
//!
//! ## External tools
//!
//! Filters run as `sh -c <command>`, talking over stdin/stdout, and are
//! killed after [`PipelineConfig::filter_timeout`]. Command lines are
//! configurable per format.
//!
//! ## Credits
//!
//! Header parsing draws from [zune-ppm](https://github.com/etemesi254/zune-image)
//! by Caleb Etemesi (MIT/Apache-2.0/Zlib licensed).
//!
//! ## Usage
//!
//! ```no_run
//! use zeningest::{ByteSource, DecodeRequest, EncodeRequest, PnmFormat, Region, Unstoppable};
//!
//! let mut source = ByteSource::open("map.pgm")?;
//! let header = DecodeRequest::new(&mut source).probe()?;
//! println!("{}x{} tiled={}", header.width, header.height, header.is_tiled());
//!
//! let mut source = ByteSource::open("map.pgm")?;
//! let corner = DecodeRequest::new(&mut source)
//!     .with_region(Region::new(0, 0, 255, 255))
//!     .decode(Unstoppable)?;
//!
//! let encoded = EncodeRequest::pnm(PnmFormat::PgmAscii).encode(&corner, Unstoppable)?;
//! # Ok::<(), zeningest::IngestError>(())
//! ```

#![forbid(unsafe_code)]

mod classify;
mod config;
mod decode;
mod decompress;
mod encode;
mod error;
mod filter;
mod ingest;
mod limits;
mod pixel;
mod raster;
mod region;
mod source;
mod tile;

pub mod pnm;

// Re-exports
pub use classify::{
    Classification, Compression, FormatTag, PEEK_LINE_MAX, RasterContainer, classify, match_magic,
};
pub use config::PipelineConfig;
pub use decode::DecodeRequest;
pub use decompress::{DecompressMode, Decompressed, decompress_if_needed};
pub use encode::EncodeRequest;
pub use enough::{Stop, StopReason, Unstoppable};
pub use error::IngestError;
pub use filter::{
    DEFAULT_FILTER_TIMEOUT, FilterConfig, FilterInput, FilterProcess, FilterTimedOut, run_filter,
    spawn as spawn_filter,
};
pub use ingest::{Ingest, Ingested, Probed, Stage, is_url};
pub use limits::Limits;
pub use pixel::PixelLayout;
pub use pnm::{PnmFamily, PnmFormat, RasterHeader, SampleEncoding, TileSize};
pub use raster::Raster;
pub use region::{PixelRect, Region};
pub use source::ByteSource;
pub use tile::{PlacedTile, TileGrid, TiledRaster, export_tiles, tile_file, tile_offset, write_tiled};

/// Decode a whole PNM image from memory.
pub fn decode(data: &[u8], stop: impl Stop) -> Result<Raster, IngestError> {
    let mut source = ByteSource::from_bytes(data.to_vec());
    DecodeRequest::new(&mut source).decode(stop)
}

/// Decode part of a PNM image from memory.
pub fn decode_region(data: &[u8], region: Region, stop: impl Stop) -> Result<Raster, IngestError> {
    let mut source = ByteSource::from_bytes(data.to_vec());
    DecodeRequest::new(&mut source)
        .with_region(region)
        .decode(stop)
}

/// Read a PNM header from memory without decoding pixels.
pub fn probe(data: &[u8]) -> Result<RasterHeader, IngestError> {
    let mut source = ByteSource::from_bytes(data.to_vec());
    DecodeRequest::new(&mut source).probe()
}

/// Encode a raster as PNM.
pub fn encode(raster: &Raster, format: PnmFormat, stop: impl Stop) -> Result<Vec<u8>, IngestError> {
    EncodeRequest::pnm(format).encode(raster, stop)
}

/// Load a file or URL with the default pipeline.
pub fn load(input: &str, stop: impl Stop) -> Result<Ingested, IngestError> {
    Ingest::default().load(input, None, stop)
}
