//! PNM header parsing and sample decoding.
//!
//! Credits: header handling draws from zune-ppm by Caleb Etemesi
//! (MIT/Apache-2.0/Zlib); streaming, region and tile support are new.

use std::io::Read;

use enough::Stop;

use super::{PnmFamily, PnmFormat, RasterHeader, SampleEncoding, TILE_ANNOTATION, TileSize};
use crate::error::IngestError;
use crate::limits::Limits;
use crate::raster::Raster;
use crate::region::PixelRect;
use crate::source::ByteSource;
use crate::tile::{TileGrid, tile_offset};

/// Longest header line accepted.
const HEADER_LINE_MAX: usize = 1024;

/// Parse the header, leaving `source` at the first sample.
///
/// Width and height may sit on separate lines; some writers split them and
/// files in the wild depend on it.
pub(crate) fn parse_header(source: &mut ByteSource) -> Result<RasterHeader, IngestError> {
    let mut line = source.read_line(HEADER_LINE_MAX)?;
    if line.is_empty() {
        return Err(IngestError::UnexpectedEof);
    }
    let format = line
        .get(..2)
        .and_then(PnmFormat::from_magic)
        .ok_or(IngestError::UnrecognizedFormat)?;
    if line.get(2).is_some_and(|b| !b.is_ascii_whitespace()) {
        return Err(IngestError::UnrecognizedFormat);
    }

    let needed = match format.family() {
        PnmFamily::Bitmap => 2,
        _ => 3,
    };
    let mut fields = Vec::with_capacity(needed);
    let mut tile = None;
    let mut start = 2;
    let mut line_no = 1;
    let end = loop {
        if let Some(end) = scan_fields(&line, start, needed, &mut fields)? {
            break end;
        }
        line = source.read_line(HEADER_LINE_MAX)?;
        if line.is_empty() {
            return Err(IngestError::UnexpectedEof);
        }
        line_no += 1;
        start = 0;
        if line.starts_with(b"#") {
            // Only the line right after the magic can carry tile sizes.
            if line_no == 2 {
                tile = parse_tile(&line);
            }
            start = line.len();
        }
    };

    // Whatever followed the last field on its line belongs to the samples;
    // binary data starts after exactly one whitespace byte.
    let rest = &line[end..];
    match format.encoding() {
        SampleEncoding::Ascii => source.unread(rest),
        SampleEncoding::Binary if rest.is_empty() => {
            let mut sep = [0u8; 1];
            if source.read(&mut sep)? == 1 && !sep[0].is_ascii_whitespace() {
                source.unread(&sep);
            }
        }
        SampleEncoding::Binary => source.unread(&rest[1..]),
    }

    let width = fields[0];
    let height = fields[1];
    if width == 0 || height == 0 {
        return Err(IngestError::InvalidHeader(format!(
            "zero dimension {width}x{height}"
        )));
    }
    let maxval = match format.family() {
        PnmFamily::Bitmap => 1,
        _ => fields[2],
    };
    if format.family() != PnmFamily::Bitmap && maxval != 255 && maxval != 65535 {
        return Err(IngestError::InvalidMaxval(maxval));
    }
    if tile.is_some()
        && (format.encoding() == SampleEncoding::Ascii || format.family() == PnmFamily::Bitmap)
    {
        log::debug!("pnm: ignoring tile annotation on {format:?}");
        tile = None;
    }

    let header = RasterHeader {
        format,
        width,
        height,
        maxval,
        layout: format.layout(maxval),
        tile,
        data_offset: source.position(),
    };
    log::debug!(
        "pnm: {:?} {}x{} maxval {} tile {:?} data at {}",
        header.format,
        header.width,
        header.height,
        header.maxval,
        header.tile,
        header.data_offset
    );
    Ok(header)
}

/// Collect numeric fields from `line[start..]` up to a `#` comment.
///
/// Returns the index just past the field that completed the header.
fn scan_fields(
    line: &[u8],
    start: usize,
    needed: usize,
    fields: &mut Vec<u32>,
) -> Result<Option<usize>, IngestError> {
    let mut i = start;
    while i < line.len() {
        let b = line[i];
        if b == b'#' {
            return Ok(None);
        }
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let token_start = i;
        while i < line.len() && !line[i].is_ascii_whitespace() && line[i] != b'#' {
            i += 1;
        }
        fields.push(parse_u32(&line[token_start..i])?);
        if fields.len() == needed {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

fn parse_u32(token: &[u8]) -> Result<u32, IngestError> {
    core::str::from_utf8(token)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            IngestError::InvalidHeader(format!(
                "unparseable header field {:?}",
                String::from_utf8_lossy(token)
            ))
        })
}

/// `# tile <w> <h>` with nonzero sizes. Any other comment, including one
/// that merely starts with `# tile`, is an ordinary comment.
fn parse_tile(line: &[u8]) -> Option<TileSize> {
    let rest = line.strip_prefix(TILE_ANNOTATION)?;
    if !rest.first()?.is_ascii_whitespace() {
        return None;
    }
    let mut fields = core::str::from_utf8(rest).ok()?.split_ascii_whitespace();
    let size = match (fields.next(), fields.next(), fields.next()) {
        (Some(w), Some(h), None) => w.parse().ok().zip(h.parse().ok()),
        _ => None,
    };
    match size {
        Some((width, height)) if width > 0 && height > 0 => Some(TileSize { width, height }),
        _ => {
            log::debug!(
                "pnm: treating {:?} as a plain comment",
                String::from_utf8_lossy(line).trim_end()
            );
            None
        }
    }
}

/// Decode `rect` (raster coordinates, y from the bottom) of an image whose
/// header has already been read from `source`.
pub(crate) fn decode(
    source: &mut ByteSource,
    header: &RasterHeader,
    rect: PixelRect,
    limits: Option<&Limits>,
    stop: &dyn Stop,
) -> Result<Raster, IngestError> {
    limits
        .unwrap_or(&Limits::NONE)
        .raster_bytes(rect.width(), rect.height(), header.layout)?;
    stop.check()?;

    // File rows run top-down.
    let frect = rect.flip_rows(header.height);
    // A short header may claim far more samples than the input holds.
    if let Some(available) = source.remaining()? {
        let needed = min_data_len(header, frect);
        if available < needed {
            log::debug!("pnm: {needed} sample bytes needed, {available} available");
            return Err(IngestError::UnexpectedEof);
        }
    }

    let mut out = Raster::new(rect.width(), rect.height(), header.layout)?;
    match (header.encoding(), header.tile) {
        (SampleEncoding::Ascii, _) => decode_ascii(source, header, frect, &mut out, stop)?,
        (SampleEncoding::Binary, Some(tile)) => {
            decode_tiles(source, header, tile, frect, &mut out, stop)?
        }
        (SampleEncoding::Binary, None) => decode_rows(source, header, frect, &mut out, stop)?,
    }
    Ok(out)
}

/// Fewest bytes after the header that decoding `frect` must read.
fn min_data_len(header: &RasterHeader, frect: PixelRect) -> u64 {
    match header.encoding() {
        // Every sample through the last requested row takes at least a byte.
        SampleEncoding::Ascii => (u64::from(frect.y1) + 1)
            .saturating_mul(u64::from(header.width))
            .saturating_mul(header.layout.channels() as u64),
        SampleEncoding::Binary => {
            let (_, take) = row_segment(header, frect.x0, frect.x1);
            take.saturating_mul(u64::from(frect.height()))
        }
    }
}

/// Byte offset within a stored row and byte count covering columns `x0..=x1`.
fn row_segment(header: &RasterHeader, x0: u32, x1: u32) -> (u64, u64) {
    match header.format.family() {
        PnmFamily::Bitmap => {
            let lead = u64::from(x0 / 8);
            (lead, u64::from(x1 / 8) - lead + 1)
        }
        _ => {
            let bpp = header.file_bytes_per_pixel();
            (u64::from(x0) * bpp, u64::from(x1 - x0 + 1) * bpp)
        }
    }
}

/// Convert one stored row segment into raster samples.
fn store_segment(header: &RasterHeader, x0: u32, x1: u32, src: &[u8], dst: &mut [u8]) {
    match header.format.family() {
        PnmFamily::Bitmap => {
            let lead = x0 / 8;
            for (out, x) in dst.iter_mut().zip(x0..=x1) {
                let byte = src[(x / 8 - lead) as usize];
                *out = (byte >> (7 - x % 8)) & 1;
            }
        }
        _ if header.maxval > 255 => {
            // Most significant byte first, as written.
            for (out, pair) in dst.chunks_exact_mut(2).zip(src.chunks_exact(2)) {
                let v = u16::from_be_bytes([pair[0], pair[1]]);
                out.copy_from_slice(&v.to_ne_bytes());
            }
        }
        _ => dst.copy_from_slice(src),
    }
}

/// Row-major binary data: seek to the first requested byte, then read each
/// requested row segment, skipping the columns on either side.
fn decode_rows(
    source: &mut ByteSource,
    header: &RasterHeader,
    frect: PixelRect,
    out: &mut Raster,
    stop: &dyn Stop,
) -> Result<(), IngestError> {
    let row_bytes = header.file_row_bytes();
    let (lead, take) = row_segment(header, frect.x0, frect.x1);
    let trail = row_bytes - lead - take;
    let start = header.data_offset + row_bytes * u64::from(frect.y0) + lead;
    if start != source.position() {
        log::debug!(
            "pnm: region {frect:?} of {}x{}, seeking to byte {start}",
            header.width,
            header.height
        );
    }
    source.seek_to(start)?;

    let mut buf = vec![0u8; take as usize];
    for fy in frect.y0..=frect.y1 {
        if (fy - frect.y0) % 16 == 0 {
            stop.check()?;
        }
        source.read_exact(&mut buf)?;
        store_segment(header, frect.x0, frect.x1, &buf, out.row_mut(frect.y1 - fy));
        if fy < frect.y1 {
            source.skip(trail + lead)?;
        }
    }
    Ok(())
}

/// Tile-major binary data: visit the tiles overlapping the request in
/// storage order, locating each through the tile offset mapping.
fn decode_tiles(
    source: &mut ByteSource,
    header: &RasterHeader,
    tile: TileSize,
    frect: PixelRect,
    out: &mut Raster,
    stop: &dyn Stop,
) -> Result<(), IngestError> {
    let bpp = header.file_bytes_per_pixel();
    let out_bpp = header.layout.bytes_per_pixel();
    log::debug!(
        "pnm: tiled region {frect:?} of {}x{} in {}x{} tiles",
        header.width,
        header.height,
        tile.width,
        tile.height
    );
    for t in TileGrid::new(header.width, header.height, tile.width, tile.height) {
        if t.y0 > frect.y1 {
            break;
        }
        let Some(part) = t.intersect(&frect) else {
            continue;
        };
        stop.check()?;
        let base = header.data_offset + tile_offset(header.width, &t, bpp);
        let tile_row = u64::from(t.width()) * bpp;
        let mut buf = vec![0u8; (u64::from(part.width()) * bpp) as usize];
        let dst_start = (part.x0 - frect.x0) as usize * out_bpp;
        let dst_end = dst_start + part.width() as usize * out_bpp;
        for fy in part.y0..=part.y1 {
            let pos = base + u64::from(fy - t.y0) * tile_row + u64::from(part.x0 - t.x0) * bpp;
            source.seek_to(pos)?;
            source.read_exact(&mut buf)?;
            let row = out.row_mut(frect.y1 - fy);
            store_segment(header, part.x0, part.x1, &buf, &mut row[dst_start..dst_end]);
        }
    }
    Ok(())
}

/// ASCII samples cannot be located by offset; read forward through the
/// last requested row, keeping only the requested samples.
fn decode_ascii(
    source: &mut ByteSource,
    header: &RasterHeader,
    frect: PixelRect,
    out: &mut Raster,
    stop: &dyn Stop,
) -> Result<(), IngestError> {
    let channels = header.layout.channels();
    let bitmap = header.format.family() == PnmFamily::Bitmap;
    for fy in 0..=frect.y1 {
        if fy % 16 == 0 {
            stop.check()?;
        }
        let keep_row = fy >= frect.y0;
        for x in 0..header.width {
            let keep = keep_row && (frect.x0..=frect.x1).contains(&x);
            for c in 0..channels {
                let v = if bitmap {
                    read_ascii_bit(source)?
                } else {
                    read_ascii_u32(source)?
                };
                if v > header.maxval {
                    return Err(IngestError::InvalidData(format!(
                        "sample {v} exceeds maxval {}",
                        header.maxval
                    )));
                }
                if keep {
                    out.set_sample(x - frect.x0, frect.y1 - fy, c, v as u16);
                }
            }
        }
    }
    Ok(())
}

fn read_byte(source: &mut ByteSource) -> Result<Option<u8>, IngestError> {
    let mut b = [0u8; 1];
    Ok((source.read(&mut b)? == 1).then_some(b[0]))
}

/// First byte of the next token, skipping whitespace and `#` comments.
fn next_token_byte(source: &mut ByteSource) -> Result<u8, IngestError> {
    loop {
        match read_byte(source)?.ok_or(IngestError::UnexpectedEof)? {
            b'#' => {
                while let Some(b) = read_byte(source)? {
                    if b == b'\n' {
                        break;
                    }
                }
            }
            b if b.is_ascii_whitespace() => {}
            b => return Ok(b),
        }
    }
}

fn read_ascii_u32(source: &mut ByteSource) -> Result<u32, IngestError> {
    let first = next_token_byte(source)?;
    if !first.is_ascii_digit() {
        return Err(IngestError::InvalidData(format!(
            "unexpected byte {first:#04x} in sample data"
        )));
    }
    let mut v = u32::from(first - b'0');
    while let Some(b) = read_byte(source)? {
        if !b.is_ascii_digit() {
            if b == b'#' {
                source.unread(&[b]);
            }
            break;
        }
        v = v
            .checked_mul(10)
            .and_then(|v| v.checked_add(u32::from(b - b'0')))
            .ok_or_else(|| IngestError::InvalidData("sample value overflows".into()))?;
    }
    Ok(v)
}

/// PBM samples are single digits and need no separator.
fn read_ascii_bit(source: &mut ByteSource) -> Result<u32, IngestError> {
    match next_token_byte(source)? {
        b'0' => Ok(0),
        b'1' => Ok(1),
        other => Err(IngestError::InvalidData(format!(
            "unexpected byte {other:#04x} in bitmap data"
        ))),
    }
}
