//! Format sniffing from the leading bytes of a stream.
//!
//! Classification peeks at most one bounded line and pushes back everything
//! it did not positively consume. The one exception is a PostScript preamble,
//! whose structured comments are read irreversibly up to `%%EndComments`; the
//! bytes read are returned in [`Classification::preamble`] so the caller can
//! restore them if it needs the stream intact.

use crate::pnm::PnmFormat;
use crate::source::ByteSource;

/// Longest line the classifier will look at.
pub const PEEK_LINE_MAX: usize = 256;

/// Upper bound on structured-comment lines scanned in a PostScript preamble.
const MAX_COMMENT_LINES: usize = 256;

/// Compressed container kinds, each handled by an external decompressor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compression {
    /// gzip, `1f 8b`.
    Gzip,
    /// Unix `compress` (LZW, `.Z`), `1f 9d`.
    Compress,
    /// `pack` (`.z`), `1f 1e`.
    Pack,
    /// bzip2, `BZ`.
    Bzip2,
}

impl Compression {
    /// Default decompression command, reading stdin and writing stdout.
    pub fn default_command(self) -> &'static str {
        match self {
            // gzip understands compress and pack streams as well
            Compression::Gzip | Compression::Compress | Compression::Pack => "gzip -dc",
            Compression::Bzip2 => "bzip2 -dc",
        }
    }
}

/// Raster containers this crate does not decode itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RasterContainer {
    Bmp,
    Gif,
    Jpeg,
    Tiff,
    Png,
    Sgi,
    SunRaster,
    Pcx,
    Mng,
    Jng,
}

impl RasterContainer {
    /// Default converter producing PNM on stdout.
    pub fn default_converter(self) -> &'static str {
        match self {
            RasterContainer::Bmp => "bmptopnm",
            RasterContainer::Gif => "giftopnm",
            RasterContainer::Jpeg => "djpeg -pnm",
            RasterContainer::Tiff => "tifftopnm",
            RasterContainer::Png => "pngtopnm",
            RasterContainer::Sgi => "sgitopnm",
            RasterContainer::SunRaster => "rasttopnm",
            RasterContainer::Pcx => "pcxtopnm",
            RasterContainer::Mng | RasterContainer::Jng => "convert - ppm:-",
        }
    }
}

/// Result tag of one classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FormatTag {
    /// Natively decodable PBM/PGM/PPM.
    Pnm(PnmFormat),
    /// Compressed container; never a terminal format.
    Compressed(Compression),
    /// Raster container needing an external converter.
    Raster(RasterContainer),
    /// PostScript document (`%!`).
    PostScript,
    /// Nothing matched.
    Foreign,
}

/// Outcome of [`classify`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub tag: FormatTag,
    /// `%%Creator:` value for PostScript, first token of the first line for
    /// foreign input.
    pub creator: Option<String>,
    /// Bytes consumed irreversibly. Only non-empty for PostScript.
    pub preamble: Vec<u8>,
}

impl Classification {
    /// Number of bytes classification took from the source.
    pub fn consumed(&self) -> usize {
        self.preamble.len()
    }

    fn tagged(tag: FormatTag) -> Self {
        Self {
            tag,
            creator: None,
            preamble: Vec::new(),
        }
    }
}

const TWO_BYTE_MAGIC: &[([u8; 2], FormatTag)] = &[
    (*b"P1", FormatTag::Pnm(PnmFormat::PbmAscii)),
    (*b"P2", FormatTag::Pnm(PnmFormat::PgmAscii)),
    (*b"P3", FormatTag::Pnm(PnmFormat::PpmAscii)),
    (*b"P4", FormatTag::Pnm(PnmFormat::PbmBinary)),
    (*b"P5", FormatTag::Pnm(PnmFormat::PgmBinary)),
    (*b"P6", FormatTag::Pnm(PnmFormat::PpmBinary)),
    ([0x1f, 0x8b], FormatTag::Compressed(Compression::Gzip)),
    ([0x1f, 0x9d], FormatTag::Compressed(Compression::Compress)),
    ([0x1f, 0x1e], FormatTag::Compressed(Compression::Pack)),
    (*b"BZ", FormatTag::Compressed(Compression::Bzip2)),
    (*b"BM", FormatTag::Raster(RasterContainer::Bmp)),
    (*b"GI", FormatTag::Raster(RasterContainer::Gif)),
    ([0xff, 0xd8], FormatTag::Raster(RasterContainer::Jpeg)),
    (*b"II", FormatTag::Raster(RasterContainer::Tiff)),
    (*b"MM", FormatTag::Raster(RasterContainer::Tiff)),
    ([0x89, b'P'], FormatTag::Raster(RasterContainer::Png)),
    ([0x01, 0xda], FormatTag::Raster(RasterContainer::Sgi)),
    ([0x59, 0xa6], FormatTag::Raster(RasterContainer::SunRaster)),
];

const ONE_BYTE_MAGIC: &[(u8, FormatTag)] = &[
    (0x0a, FormatTag::Raster(RasterContainer::Pcx)),
    (0x8a, FormatTag::Raster(RasterContainer::Mng)),
    (0x8b, FormatTag::Raster(RasterContainer::Jng)),
];

/// Match a two-byte prefix against the fixed magic tables.
pub fn match_magic(bytes: &[u8]) -> Option<FormatTag> {
    if let [a, b, ..] = bytes {
        if let Some((_, tag)) = TWO_BYTE_MAGIC.iter().find(|(m, _)| m == &[*a, *b]) {
            return Some(*tag);
        }
    }
    let first = *bytes.first()?;
    ONE_BYTE_MAGIC
        .iter()
        .find(|(m, _)| *m == first)
        .map(|(_, tag)| *tag)
}

/// Identify the format of `source`.
///
/// Never fails: read errors degrade to whatever was peeked, and anything
/// unrecognized comes back as [`FormatTag::Foreign`].
pub fn classify(source: &mut ByteSource) -> Classification {
    let line = match source.peek_line(PEEK_LINE_MAX) {
        Ok(line) => line,
        Err(e) => {
            log::warn!("classify: read failed, treating input as foreign: {e}");
            Vec::new()
        }
    };

    if let Some(tag) = match_magic(&line) {
        log::debug!("classify: magic {:02x?} -> {tag:?}", &line[..line.len().min(2)]);
        return Classification::tagged(tag);
    }

    if line.starts_with(b"%!") {
        return scan_postscript(source);
    }

    let creator = first_token(&line);
    log::debug!("classify: no magic match, creator label {creator:?}");
    Classification {
        tag: FormatTag::Foreign,
        creator: Some(creator),
        preamble: Vec::new(),
    }
}

/// Read structured comments until `%%Creator:` or `%%EndComments`.
fn scan_postscript(source: &mut ByteSource) -> Classification {
    let mut preamble = Vec::new();
    let mut creator = None;
    for _ in 0..MAX_COMMENT_LINES {
        let line = match source.read_line(PEEK_LINE_MAX) {
            Ok(line) if !line.is_empty() => line,
            Ok(_) => break,
            Err(e) => {
                log::warn!("classify: PostScript preamble read failed: {e}");
                break;
            }
        };
        preamble.extend_from_slice(&line);
        if let Some(rest) = line.strip_prefix(b"%%Creator:") {
            creator = Some(String::from_utf8_lossy(rest).trim().to_string());
            break;
        }
        if line.starts_with(b"%%EndComments") {
            break;
        }
    }
    log::debug!(
        "classify: PostScript, creator {creator:?}, {} preamble bytes consumed",
        preamble.len()
    );
    Classification {
        tag: FormatTag::PostScript,
        creator,
        preamble,
    }
}

/// First whitespace-delimited token of a line, or the whole line without
/// its terminator when it holds no whitespace.
fn first_token(line: &[u8]) -> String {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let rest = &line[start..];
    let end = rest
        .iter()
        .position(|b| b.is_ascii_whitespace())
        .unwrap_or(rest.len());
    String::from_utf8_lossy(&rest[..end]).into_owned()
}
