//! Tile partitioning, the tiled on-disk writer, and tile export.
//!
//! Tiles are addressed in file coordinates: row 0 is the top row as
//! stored. A tiled file stores the header, then each tile in grid order,
//! each tile's rows top to bottom.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use enough::Stop;

use crate::error::IngestError;
use crate::pnm::{self, PnmFamily, RasterHeader, SampleEncoding, TileSize};
use crate::raster::Raster;
use crate::region::PixelRect;
use crate::source::ByteSource;

/// Row-major walk over the tiles of a `width` x `height` image.
///
/// Edge tiles are clipped to the image, not padded, so tile sizes vary
/// along the right and bottom edges. Not rewindable; build a new grid to
/// start over.
#[derive(Clone, Debug)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    x: u32,
    y: u32,
    done: bool,
}

impl TileGrid {
    /// Tile sizes below 1 are treated as 1.
    pub fn new(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            width,
            height,
            tile_width: tile_width.max(1),
            tile_height: tile_height.max(1),
            x: 0,
            y: 0,
            done: width == 0 || height == 0,
        }
    }

    pub fn columns(&self) -> u32 {
        self.width.div_ceil(self.tile_width)
    }

    pub fn rows(&self) -> u32 {
        self.height.div_ceil(self.tile_height)
    }

    /// Total tiles in the grid, including ones already emitted.
    pub fn tile_count(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }
}

impl Iterator for TileGrid {
    type Item = PixelRect;

    fn next(&mut self) -> Option<PixelRect> {
        if self.done {
            return None;
        }
        let rect = PixelRect {
            x0: self.x,
            y0: self.y,
            x1: self.x.saturating_add(self.tile_width - 1).min(self.width - 1),
            y1: self.y.saturating_add(self.tile_height - 1).min(self.height - 1),
        };
        if rect.x1 == self.width - 1 {
            if rect.y1 == self.height - 1 {
                self.done = true;
            }
            self.x = 0;
            self.y = rect.y1 + 1;
        } else {
            self.x = rect.x1 + 1;
        }
        Some(rect)
    }
}

/// Byte offset of `tile` from the start of tiled pixel data.
///
/// Everything above the tile's first row is whole tile rows
/// (`y0 * image_width` pixels); the tiles to its left in the same tile row
/// share its height and together span `x0` columns.
pub fn tile_offset(image_width: u32, tile: &PixelRect, bytes_per_pixel: u64) -> u64 {
    let above = u64::from(tile.y0) * u64::from(image_width);
    let left = u64::from(tile.x0) * u64::from(tile.height());
    (above + left) * bytes_per_pixel
}

/// Re-emit a binary PGM/PPM from `source` tile by tile into `dst`.
///
/// Tiles revisit earlier rows, so `source` must be seekable. Returns the
/// header as written.
pub fn write_tiled<W: Write>(
    source: &mut ByteSource,
    dst: &mut W,
    tile_width: u32,
    tile_height: u32,
    stop: impl Stop,
) -> Result<RasterHeader, IngestError> {
    let header = pnm::parse_header(source)?;
    if header.encoding() != SampleEncoding::Binary || header.format.family() == PnmFamily::Bitmap
    {
        return Err(IngestError::UnsupportedVariant(format!(
            "tiling needs binary PGM or PPM, got {:?}",
            header.format
        )));
    }
    if header.is_tiled() {
        return Err(IngestError::UnsupportedVariant(
            "source is already tiled".into(),
        ));
    }
    if !source.is_seekable() {
        return Err(IngestError::UnsupportedVariant(
            "tiling needs a seekable source".into(),
        ));
    }

    let tile = TileSize {
        width: tile_width.max(1),
        height: tile_height.max(1),
    };
    pnm::write_header(
        dst,
        header.format,
        header.width,
        header.height,
        header.maxval,
        Some(tile),
    )?;

    let bpp = header.file_bytes_per_pixel();
    let row_bytes = header.file_row_bytes();
    let grid = TileGrid::new(header.width, header.height, tile.width, tile.height);
    log::debug!(
        "tile: writing {}x{} as {} tiles of {}x{}",
        header.width,
        header.height,
        grid.tile_count(),
        tile.width,
        tile.height
    );
    let mut buf = Vec::new();
    for t in grid {
        stop.check()?;
        buf.resize((u64::from(t.width()) * bpp) as usize, 0);
        for fy in t.y0..=t.y1 {
            let pos = header.data_offset + u64::from(fy) * row_bytes + u64::from(t.x0) * bpp;
            source.seek_to(pos)?;
            source.read_exact(&mut buf)?;
            dst.write_all(&buf)?;
        }
    }
    dst.flush()?;
    Ok(RasterHeader {
        tile: Some(tile),
        ..header
    })
}

/// Tile the file at `src` into a new file at `dst`.
pub fn tile_file(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    tile_width: u32,
    tile_height: u32,
    stop: impl Stop,
) -> Result<RasterHeader, IngestError> {
    let mut source = ByteSource::open(src)?;
    let mut out = BufWriter::new(File::create(dst)?);
    let header = write_tiled(&mut source, &mut out, tile_width, tile_height, stop)?;
    out.flush()?;
    Ok(header)
}

/// One tile of an exported raster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedTile {
    /// Left column in the full raster.
    pub x: u32,
    /// Bottom row in the full raster (raster rows count from the bottom).
    pub y: u32,
    pub raster: Raster,
}

/// Result of [`export_tiles`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TiledRaster {
    /// The raster fit in one tile and is returned as-is, without grouping.
    Single(Raster),
    /// Tiles in grid order (top-left first).
    Group(Vec<PlacedTile>),
}

impl TiledRaster {
    pub fn len(&self) -> usize {
        match self {
            TiledRaster::Single(_) => 1,
            TiledRaster::Group(tiles) => tiles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Split `raster` into tiles, each carrying its position.
pub fn export_tiles(
    raster: Raster,
    tile_width: u32,
    tile_height: u32,
) -> Result<TiledRaster, IngestError> {
    let grid = TileGrid::new(raster.width(), raster.height(), tile_width, tile_height);
    if grid.tile_count() <= 1 {
        return Ok(TiledRaster::Single(raster));
    }
    let mut tiles = Vec::with_capacity(grid.tile_count());
    for t in grid {
        let rect = t.flip_rows(raster.height());
        tiles.push(PlacedTile {
            x: rect.x0,
            y: rect.y0,
            raster: raster.crop(rect)?,
        });
    }
    Ok(TiledRaster::Group(tiles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::PixelLayout;
    use enough::Unstoppable;
    use proptest::prelude::*;

    #[test]
    fn edge_tiles_are_clipped() {
        let tiles: Vec<_> = TileGrid::new(5, 3, 2, 2).collect();
        assert_eq!(tiles.len(), 6);
        assert_eq!(tiles[2], PixelRect { x0: 4, y0: 0, x1: 4, y1: 1 });
        assert_eq!(tiles[3], PixelRect { x0: 0, y0: 2, x1: 1, y1: 2 });
        assert_eq!(tiles[5], PixelRect { x0: 4, y0: 2, x1: 4, y1: 2 });
    }

    #[test]
    fn oversized_and_zero_tiles() {
        let tiles: Vec<_> = TileGrid::new(3, 3, 100, 0).collect();
        assert_eq!(tiles.len(), 3);
        assert_eq!(tiles[0], PixelRect { x0: 0, y0: 0, x1: 2, y1: 0 });
        assert_eq!(TileGrid::new(0, 4, 2, 2).count(), 0);
    }

    #[test]
    fn offsets_follow_storage_order() {
        // 5x3 image, 2x2 tiles, 1 byte per pixel.
        let offsets: Vec<_> = TileGrid::new(5, 3, 2, 2)
            .map(|t| tile_offset(5, &t, 1))
            .collect();
        assert_eq!(offsets, [0, 4, 8, 10, 12, 14]);
    }

    #[test]
    fn writer_rejects_ascii_and_streams() {
        let mut out = Vec::new();
        let mut src = ByteSource::from_bytes(b"P2\n1 1\n255\n0\n".to_vec());
        assert!(matches!(
            write_tiled(&mut src, &mut out, 1, 1, Unstoppable),
            Err(IngestError::UnsupportedVariant(_))
        ));
        let mut src =
            ByteSource::from_reader(std::io::Cursor::new(b"P5\n1 1\n255\n\x00".to_vec()));
        assert!(matches!(
            write_tiled(&mut src, &mut out, 1, 1, Unstoppable),
            Err(IngestError::UnsupportedVariant(_))
        ));
    }

    #[test]
    fn export_single_tile_is_not_grouped() {
        let r = Raster::new(4, 4, PixelLayout::Gray8).unwrap();
        assert!(matches!(
            export_tiles(r, 8, 8).unwrap(),
            TiledRaster::Single(_)
        ));
    }

    #[test]
    fn export_places_tiles() {
        let pixels = (0..12).collect();
        let r = Raster::from_pixels(pixels, 4, 3, PixelLayout::Gray8).unwrap();
        let TiledRaster::Group(tiles) = export_tiles(r, 2, 2).unwrap() else {
            panic!("expected a group");
        };
        assert_eq!(tiles.len(), 4);
        // First tile is the top-left: raster rows 1..=2.
        assert_eq!((tiles[0].x, tiles[0].y), (0, 1));
        assert_eq!(tiles[0].raster.pixels(), &[4, 5, 8, 9]);
        // Bottom row of tiles is one pixel tall.
        assert_eq!((tiles[3].x, tiles[3].y), (2, 0));
        assert_eq!(tiles[3].raster.pixels(), &[2, 3]);
    }

    proptest! {
        #[test]
        fn grid_covers_every_pixel_once(
            w in 1u32..40, h in 1u32..40, tw in 1u32..12, th in 1u32..12,
        ) {
            let grid = TileGrid::new(w, h, tw, th);
            let expected = grid.tile_count();
            let mut seen = vec![0u8; (w * h) as usize];
            let mut count = 0;
            let mut last_offset = None;
            for t in grid {
                count += 1;
                let offset = tile_offset(w, &t, 1);
                prop_assert!(last_offset.is_none_or(|prev| offset > prev));
                last_offset = Some(offset);
                for y in t.y0..=t.y1 {
                    for x in t.x0..=t.x1 {
                        seen[(y * w + x) as usize] += 1;
                    }
                }
            }
            prop_assert_eq!(count, expected);
            prop_assert!(seen.iter().all(|&n| n == 1));
        }
    }
}
