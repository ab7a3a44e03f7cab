//! PNM encoder: P1 through P6.
//!
//! Credits: Draws from zune-ppm by Caleb Etemesi (MIT/Apache-2.0/Zlib).

use std::io::{self, Write};

use enough::Stop;

use super::{PnmFamily, PnmFormat, SampleEncoding, TILE_ANNOTATION, TileSize};
use crate::error::IngestError;
use crate::raster::Raster;

/// ASCII sample lines are wrapped before this column.
const ASCII_LINE_MAX: usize = 70;

/// Write a header. PBM has no maxval line; `maxval` is ignored for it.
pub(crate) fn write_header<W: Write>(
    out: &mut W,
    format: PnmFormat,
    width: u32,
    height: u32,
    maxval: u32,
    tile: Option<TileSize>,
) -> io::Result<()> {
    out.write_all(format.magic())?;
    out.write_all(b"\n")?;
    if let Some(tile) = tile {
        out.write_all(TILE_ANNOTATION)?;
        writeln!(out, " {} {}", tile.width, tile.height)?;
    }
    writeln!(out, "{width} {height}")?;
    if format.family() != PnmFamily::Bitmap {
        writeln!(out, "{maxval}")?;
    }
    Ok(())
}

/// Encode a raster. The format's family must match the raster layout.
pub(crate) fn encode_pnm(
    raster: &Raster,
    format: PnmFormat,
    stop: &dyn Stop,
) -> Result<Vec<u8>, IngestError> {
    let family = PnmFormat::family_for(raster.layout());
    if family != format.family() {
        return Err(IngestError::UnsupportedVariant(format!(
            "{:?} raster cannot be written as {format:?}",
            raster.layout()
        )));
    }
    stop.check()?;

    let mut out = Vec::with_capacity(32 + raster.pixels().len());
    write_header(
        &mut out,
        format,
        raster.width(),
        raster.height(),
        u32::from(raster.maxval()),
        None,
    )?;
    match format.encoding() {
        SampleEncoding::Binary => encode_binary(raster, family, &mut out, stop)?,
        SampleEncoding::Ascii => encode_ascii(raster, family, &mut out, stop)?,
    }
    Ok(out)
}

/// Raster rows are bottom-up; files are written top row first.
fn file_rows(raster: &Raster) -> impl Iterator<Item = (u32, &[u8])> {
    (0..raster.height()).map(move |fy| (fy, raster.row(raster.height() - 1 - fy)))
}

fn encode_binary(
    raster: &Raster,
    family: PnmFamily,
    out: &mut Vec<u8>,
    stop: &dyn Stop,
) -> Result<(), IngestError> {
    let wide = raster.layout().bytes_per_sample() == 2;
    for (fy, row) in file_rows(raster) {
        if fy % 16 == 0 {
            stop.check()?;
        }
        match family {
            PnmFamily::Bitmap => {
                for chunk in row.chunks(8) {
                    let byte = chunk
                        .iter()
                        .enumerate()
                        .fold(0u8, |acc, (i, &bit)| acc | ((bit & 1) << (7 - i)));
                    out.push(byte);
                }
            }
            _ if wide => {
                for pair in row.chunks_exact(2) {
                    let v = u16::from_ne_bytes([pair[0], pair[1]]);
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            _ => out.extend_from_slice(row),
        }
    }
    Ok(())
}

fn encode_ascii(
    raster: &Raster,
    family: PnmFamily,
    out: &mut Vec<u8>,
    stop: &dyn Stop,
) -> Result<(), IngestError> {
    let channels = raster.layout().channels();
    let mut line = String::with_capacity(ASCII_LINE_MAX + 8);
    for fy in 0..raster.height() {
        if fy % 16 == 0 {
            stop.check()?;
        }
        let y = raster.height() - 1 - fy;
        for x in 0..raster.width() {
            for c in 0..channels {
                let v = raster.sample(x, y, c);
                let v = if family == PnmFamily::Bitmap { v & 1 } else { v };
                let token = v.to_string();
                if !line.is_empty() && line.len() + 1 + token.len() > ASCII_LINE_MAX {
                    out.extend_from_slice(line.as_bytes());
                    out.push(b'\n');
                    line.clear();
                }
                if !line.is_empty() {
                    line.push(' ');
                }
                line.push_str(&token);
            }
        }
        out.extend_from_slice(line.as_bytes());
        out.push(b'\n');
        line.clear();
    }
    Ok(())
}
