//! PNM family: P1-P6 (PBM, PGM, PPM in ASCII and binary sample encodings).
//!
//! Files written by the tiler carry a `# tile <w> <h>` comment as their
//! second header line and store pixel data tile by tile instead of row by
//! row. Readers unaware of tiling see an ordinary comment.

mod decode;
mod encode;

pub(crate) use decode::{decode, parse_header};
pub(crate) use encode::{encode_pnm, write_header};

use crate::pixel::PixelLayout;

/// Comment prefix marking a tiled file.
pub const TILE_ANNOTATION: &[u8] = b"# tile";

/// One of the six PNM variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PnmFormat {
    /// P1: ASCII bitmap (PBM).
    PbmAscii,
    /// P2: ASCII graymap (PGM).
    PgmAscii,
    /// P3: ASCII pixmap (PPM).
    PpmAscii,
    /// P4: binary bitmap (PBM).
    PbmBinary,
    /// P5: binary graymap (PGM).
    PgmBinary,
    /// P6: binary pixmap (PPM).
    PpmBinary,
}

/// Image kind, independent of sample encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PnmFamily {
    Bitmap,
    Graymap,
    Pixmap,
}

/// How samples are stored after the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    /// Whitespace-separated decimal text.
    Ascii,
    /// Raw bytes (bits for PBM).
    Binary,
}

impl PnmFormat {
    pub fn from_magic(magic: &[u8]) -> Option<Self> {
        match magic {
            b"P1" => Some(PnmFormat::PbmAscii),
            b"P2" => Some(PnmFormat::PgmAscii),
            b"P3" => Some(PnmFormat::PpmAscii),
            b"P4" => Some(PnmFormat::PbmBinary),
            b"P5" => Some(PnmFormat::PgmBinary),
            b"P6" => Some(PnmFormat::PpmBinary),
            _ => None,
        }
    }

    pub fn magic(self) -> &'static [u8; 2] {
        match self {
            PnmFormat::PbmAscii => b"P1",
            PnmFormat::PgmAscii => b"P2",
            PnmFormat::PpmAscii => b"P3",
            PnmFormat::PbmBinary => b"P4",
            PnmFormat::PgmBinary => b"P5",
            PnmFormat::PpmBinary => b"P6",
        }
    }

    pub fn new(family: PnmFamily, encoding: SampleEncoding) -> Self {
        match (family, encoding) {
            (PnmFamily::Bitmap, SampleEncoding::Ascii) => PnmFormat::PbmAscii,
            (PnmFamily::Graymap, SampleEncoding::Ascii) => PnmFormat::PgmAscii,
            (PnmFamily::Pixmap, SampleEncoding::Ascii) => PnmFormat::PpmAscii,
            (PnmFamily::Bitmap, SampleEncoding::Binary) => PnmFormat::PbmBinary,
            (PnmFamily::Graymap, SampleEncoding::Binary) => PnmFormat::PgmBinary,
            (PnmFamily::Pixmap, SampleEncoding::Binary) => PnmFormat::PpmBinary,
        }
    }

    pub fn family(self) -> PnmFamily {
        match self {
            PnmFormat::PbmAscii | PnmFormat::PbmBinary => PnmFamily::Bitmap,
            PnmFormat::PgmAscii | PnmFormat::PgmBinary => PnmFamily::Graymap,
            PnmFormat::PpmAscii | PnmFormat::PpmBinary => PnmFamily::Pixmap,
        }
    }

    pub fn encoding(self) -> SampleEncoding {
        match self {
            PnmFormat::PbmAscii | PnmFormat::PgmAscii | PnmFormat::PpmAscii => {
                SampleEncoding::Ascii
            }
            PnmFormat::PbmBinary | PnmFormat::PgmBinary | PnmFormat::PpmBinary => {
                SampleEncoding::Binary
            }
        }
    }

    /// Layout a file of this format decodes into.
    pub fn layout(self, maxval: u32) -> PixelLayout {
        let wide = maxval > 255;
        match (self.family(), wide) {
            (PnmFamily::Bitmap, _) => PixelLayout::Bit1,
            (PnmFamily::Graymap, false) => PixelLayout::Gray8,
            (PnmFamily::Graymap, true) => PixelLayout::Gray16,
            (PnmFamily::Pixmap, false) => PixelLayout::Rgb8,
            (PnmFamily::Pixmap, true) => PixelLayout::Rgb16,
        }
    }

    /// Format family able to hold `layout`.
    pub fn family_for(layout: PixelLayout) -> PnmFamily {
        match layout {
            PixelLayout::Bit1 => PnmFamily::Bitmap,
            PixelLayout::Gray8 | PixelLayout::Gray16 => PnmFamily::Graymap,
            PixelLayout::Rgb8 | PixelLayout::Rgb16 => PnmFamily::Pixmap,
        }
    }
}

/// Tile dimensions recorded by the tiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

/// Parsed and validated PNM header.
///
/// Only ever constructed from a header that passed validation: non-zero
/// dimensions and, outside PBM, a maxval of exactly 255 or 65535.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RasterHeader {
    pub format: PnmFormat,
    pub width: u32,
    pub height: u32,
    /// 1 for PBM.
    pub maxval: u32,
    pub layout: PixelLayout,
    /// Present when the file was written tile by tile.
    pub tile: Option<TileSize>,
    /// Offset of the first sample byte from the start of the stream.
    pub data_offset: u64,
}

impl RasterHeader {
    pub fn encoding(&self) -> SampleEncoding {
        self.format.encoding()
    }

    pub fn is_tiled(&self) -> bool {
        self.tile.is_some()
    }

    /// Bytes per pixel in the file (binary PGM/PPM only; PBM packs bits).
    pub fn file_bytes_per_pixel(&self) -> u64 {
        let sample = if self.maxval > 255 { 2 } else { 1 };
        self.layout.channels() as u64 * sample
    }

    /// Bytes per stored row in a binary, untiled file.
    pub fn file_row_bytes(&self) -> u64 {
        match self.format.family() {
            PnmFamily::Bitmap => u64::from(self.width).div_ceil(8),
            _ => u64::from(self.width) * self.file_bytes_per_pixel(),
        }
    }

    /// Total bytes of binary pixel data.
    pub fn file_data_len(&self) -> u64 {
        self.file_row_bytes() * u64::from(self.height)
    }
}
