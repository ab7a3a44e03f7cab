use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use enough::Unstoppable;
use zeningest::*;

/// Seekable reader that counts the bytes actually pulled from it.
struct Counting {
    inner: Cursor<Vec<u8>>,
    read: Arc<AtomicU64>,
}

impl Read for Counting {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read.fetch_add(n as u64, Ordering::SeqCst);
        Ok(n)
    }
}

impl Seek for Counting {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

fn gray_pattern(w: u32, h: u32) -> Raster {
    let pixels = (0..w * h).map(|i| ((i * 7) % 251) as u8).collect();
    Raster::from_pixels(pixels, w, h, PixelLayout::Gray8).unwrap()
}

fn tiled_bytes(raster: &Raster, format: PnmFormat, tw: u32, th: u32) -> Vec<u8> {
    let plain = encode(raster, format, Unstoppable).unwrap();
    let mut out = Vec::new();
    write_tiled(&mut ByteSource::from_bytes(plain), &mut out, tw, th, Unstoppable).unwrap();
    out
}

#[test]
fn ppm_roundtrip_rgb8() {
    let (w, h) = (4u32, 3u32);
    let mut raster = Raster::new(w, h, PixelLayout::Rgb8).unwrap();
    for y in 0..h {
        for x in 0..w {
            let rgb = if (x + y) % 2 == 0 { [255, 0, 128] } else { [0, 200, 50] };
            for (c, v) in rgb.into_iter().enumerate() {
                raster.set_sample(x, y, c, v);
            }
        }
    }

    for format in [PnmFormat::PpmBinary, PnmFormat::PpmAscii] {
        let encoded = encode(&raster, format, Unstoppable).unwrap();
        let decoded = decode(&encoded, Unstoppable).unwrap();
        assert_eq!(decoded, raster, "{format:?}");
    }
}

#[test]
fn sixteen_bit_roundtrip() {
    let mut raster = Raster::new(3, 2, PixelLayout::Rgb16).unwrap();
    for (i, v) in [0u16, 1, 255, 256, 4096, 65535].into_iter().enumerate() {
        raster.set_sample(i as u32 % 3, i as u32 / 3, i % 3, v);
    }
    let encoded = encode(&raster, PnmFormat::PpmBinary, Unstoppable).unwrap();
    let header = probe(&encoded).unwrap();
    assert_eq!(header.maxval, 65535);
    assert_eq!(decode(&encoded, Unstoppable).unwrap(), raster);
}

#[test]
fn binary_and_ascii_pgm_agree() {
    let binary = b"P5\n3 2\n255\n\x00\x10\x20\xf0\xfe\xff".to_vec();
    let ascii = b"P2\n# same pixels\n3 2\n255\n0 16 32\n240 254 255\n".to_vec();
    let a = decode(&binary, Unstoppable).unwrap();
    let b = decode(&ascii, Unstoppable).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.row(0), &[240, 254, 255]);
}

#[test]
fn maxval_1000_is_rejected_before_allocation() {
    // The sample data is absent; a decoder that allocated first would
    // fail with UnexpectedEof instead.
    let data = b"P5\n100000 100000\n1000\n";
    assert!(matches!(
        decode(data, Unstoppable),
        Err(IngestError::InvalidMaxval(1000))
    ));
}

#[test]
fn limits_are_enforced() {
    let raster = Raster::new(1, 2, PixelLayout::Rgb8).unwrap();
    let encoded = encode(&raster, PnmFormat::PpmBinary, Unstoppable).unwrap();

    let limits = Limits {
        max_pixels: Some(1),
        ..Default::default()
    };
    let mut source = ByteSource::from_bytes(encoded);
    let result = DecodeRequest::new(&mut source)
        .with_limits(&limits)
        .decode(Unstoppable);
    match result.unwrap_err() {
        IngestError::LimitExceeded(_) => {}
        other => panic!("expected LimitExceeded, got {other:?}"),
    }
}

#[test]
fn tiled_region_seeks_past_other_tiles() {
    let raster = gray_pattern(128, 128);
    let tiled = tiled_bytes(&raster, PnmFormat::PgmBinary, 64, 64);
    assert!(tiled.starts_with(b"P5\n# tile 64 64\n128 128\n255\n"));

    let total = tiled.len() as u64;
    let read = Arc::new(AtomicU64::new(0));
    let mut source = ByteSource::from_seekable(Counting {
        inner: Cursor::new(tiled),
        read: Arc::clone(&read),
    });
    assert_eq!(
        classify(&mut source).tag,
        FormatTag::Pnm(PnmFormat::PgmBinary)
    );

    let header = DecodeRequest::new(&mut source).probe().unwrap();
    assert!(header.is_tiled());
    assert_eq!(
        header.tile,
        Some(TileSize {
            width: 64,
            height: 64
        })
    );

    let part = DecodeRequest::new(&mut source)
        .with_region(Region::new(0, 0, 63, 63))
        .decode_with_header(&header, Unstoppable)
        .unwrap();
    assert_eq!(part, raster.crop(PixelRect { x0: 0, y0: 0, x1: 63, y1: 63 }).unwrap());
    let pulled = read.load(Ordering::SeqCst);
    assert!(pulled < 128 * 64, "read {pulled} of {total} bytes");
}

#[test]
fn untiled_region_matches_crop() {
    let raster = gray_pattern(37, 23);
    let encoded = encode(&raster, PnmFormat::PgmBinary, Unstoppable).unwrap();
    let region = Region::new(5, 3, 20, 17);
    let rect = region.clamp(37, 23);
    let part = decode_region(&encoded, region, Unstoppable).unwrap();
    assert_eq!(part, raster.crop(rect).unwrap());

    // Same answer from a forward-only stream.
    let mut stream = ByteSource::from_reader(Cursor::new(encoded));
    let streamed = DecodeRequest::new(&mut stream)
        .with_region(region)
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(streamed, part);
}

#[test]
fn every_tile_decodes_through_the_offset_mapping() {
    let raster = gray_pattern(50, 30);
    let tiled = tiled_bytes(&raster, PnmFormat::PgmBinary, 16, 12);
    let plain = decode(&encode(&raster, PnmFormat::PgmBinary, Unstoppable).unwrap(), Unstoppable)
        .unwrap();

    let header = probe(&tiled).unwrap();
    let mut rebuilt = Raster::new(50, 30, PixelLayout::Gray8).unwrap();
    for tile in TileGrid::new(50, 30, 16, 12) {
        let start = (header.data_offset + tile_offset(50, &tile, 1)) as usize;
        let bytes = &tiled[start..start + (tile.width() * tile.height()) as usize];
        for (row, fy) in (tile.y0..=tile.y1).enumerate() {
            let src = &bytes[row * tile.width() as usize..][..tile.width() as usize];
            let y = 29 - fy;
            for (i, x) in (tile.x0..=tile.x1).enumerate() {
                rebuilt.set_sample(x, y, 0, u16::from(src[i]));
            }
        }
    }
    assert_eq!(rebuilt, plain);
    assert_eq!(decode(&tiled, Unstoppable).unwrap(), plain);
}

#[test]
fn inverted_and_out_of_range_regions_clamp() {
    let raster = gray_pattern(10, 10);
    let encoded = encode(&raster, PnmFormat::PgmBinary, Unstoppable).unwrap();
    let part = decode_region(&encoded, Region::new(8, 7, 2, -40), Unstoppable).unwrap();
    assert_eq!((part.width(), part.height()), (1, 1));
    assert_eq!(part.sample(0, 0, 0), raster.sample(8, 7, 0));

    let all = decode_region(&encoded, Region::new(-5, -5, 500, 500), Unstoppable).unwrap();
    assert_eq!(all, raster);
}
