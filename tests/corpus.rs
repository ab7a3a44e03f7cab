//! Test corpus: roundtrip tests with various patterns, sizes, and formats.

use enough::Unstoppable;
use zeningest::*;

fn checkerboard(w: u32, h: u32, layout: PixelLayout) -> Raster {
    let mut r = Raster::new(w, h, layout).unwrap();
    let max = r.maxval();
    for y in 0..h {
        for x in 0..w {
            for c in 0..layout.channels() {
                let v = if (x + y) % 2 == 0 {
                    max - c as u16
                } else {
                    (c as u16 * 30).min(max)
                };
                r.set_sample(x, y, c, v);
            }
        }
    }
    r
}

fn noise(w: u32, h: u32, layout: PixelLayout) -> Raster {
    let mut r = Raster::new(w, h, layout).unwrap();
    let max = u32::from(r.maxval());
    let mut state: u32 = 0xDEAD_BEEF;
    for y in 0..h {
        for x in 0..w {
            for c in 0..layout.channels() {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                r.set_sample(x, y, c, (state % (max + 1)) as u16);
            }
        }
    }
    r
}

fn formats_for(layout: PixelLayout) -> [PnmFormat; 2] {
    match PnmFormat::family_for(layout) {
        PnmFamily::Bitmap => [PnmFormat::PbmAscii, PnmFormat::PbmBinary],
        PnmFamily::Graymap => [PnmFormat::PgmAscii, PnmFormat::PgmBinary],
        PnmFamily::Pixmap => [PnmFormat::PpmAscii, PnmFormat::PpmBinary],
    }
}

const LAYOUTS: [PixelLayout; 5] = [
    PixelLayout::Bit1,
    PixelLayout::Gray8,
    PixelLayout::Gray16,
    PixelLayout::Rgb8,
    PixelLayout::Rgb16,
];

// ── PNM roundtrips ───────────────────────────────────────────────────

#[test]
fn every_layout_and_encoding_roundtrips() {
    for layout in LAYOUTS {
        for format in formats_for(layout) {
            for (w, h) in [(1, 1), (7, 3), (9, 17), (33, 2)] {
                for raster in [checkerboard(w, h, layout), noise(w, h, layout)] {
                    let encoded = encode(&raster, format, Unstoppable).unwrap();
                    let header = probe(&encoded).unwrap();
                    assert_eq!(header.format, format);
                    assert_eq!(header.layout, layout);
                    let decoded = decode(&encoded, Unstoppable).unwrap();
                    assert_eq!(decoded, raster, "{format:?} {w}x{h}");
                }
            }
        }
    }
}

#[test]
fn regions_agree_across_encodings() {
    let region = Region::new(3, 1, 11, 6);
    for layout in LAYOUTS {
        let raster = noise(13, 9, layout);
        let expected = raster.crop(region.clamp(13, 9)).unwrap();
        for format in formats_for(layout) {
            let encoded = encode(&raster, format, Unstoppable).unwrap();
            let part = decode_region(&encoded, region, Unstoppable).unwrap();
            assert_eq!(part, expected, "{format:?}");
        }
    }
}

// ── Tiled files ──────────────────────────────────────────────────────

#[test]
fn tiled_files_decode_like_untiled() {
    for layout in [
        PixelLayout::Gray8,
        PixelLayout::Gray16,
        PixelLayout::Rgb8,
        PixelLayout::Rgb16,
    ] {
        let raster = noise(21, 14, layout);
        let format = formats_for(layout)[1];
        let plain = encode(&raster, format, Unstoppable).unwrap();
        for (tw, th) in [(1, 1), (4, 4), (8, 5), (21, 14), (64, 64)] {
            let mut tiled = Vec::new();
            let header = write_tiled(
                &mut ByteSource::from_bytes(plain.clone()),
                &mut tiled,
                tw,
                th,
                Unstoppable,
            )
            .unwrap();
            assert_eq!(header.tile, Some(TileSize { width: tw, height: th }));
            assert_eq!(tiled.len(), plain.len() + format!("# tile {tw} {th}\n").len());
            assert_eq!(decode(&tiled, Unstoppable).unwrap(), raster, "{layout:?} {tw}x{th}");

            for region in [Region::new(0, 0, 5, 5), Region::new(6, 2, 20, 9)] {
                let expected = raster.crop(region.clamp(21, 14)).unwrap();
                let part = decode_region(&tiled, region, Unstoppable).unwrap();
                assert_eq!(part, expected, "{layout:?} {tw}x{th} {region:?}");
            }
        }
    }
}

#[test]
fn tile_annotation_is_just_a_comment_to_other_readers() {
    // A reader skipping comments sees the same dimensions.
    let raster = noise(6, 4, PixelLayout::Gray8);
    let plain = encode(&raster, PnmFormat::PgmBinary, Unstoppable).unwrap();
    let mut tiled = Vec::new();
    write_tiled(&mut ByteSource::from_bytes(plain), &mut tiled, 3, 2, Unstoppable).unwrap();
    let text: Vec<&[u8]> = tiled.split(|&b| b == b'\n').take(4).collect();
    assert_eq!(text[0], b"P5");
    assert!(text[1].starts_with(b"#"));
    assert_eq!(text[2], b"6 4");
    assert_eq!(text[3], b"255");
}

#[test]
fn comments_resembling_tile_annotations_still_decode() {
    let r = decode(b"P2\n# tiled by hand\n2 1\n255\n10 20\n", Unstoppable).unwrap();
    assert_eq!(r.pixels(), &[10, 20]);

    let r = decode(b"P5\n# tile 64\n2 1\n255\n\x01\x02", Unstoppable).unwrap();
    assert_eq!(r.pixels(), &[1, 2]);

    let r = decode(b"P5\n# tile x y\n2 2\n255\n\x01\x02\x03\x04", Unstoppable).unwrap();
    assert_eq!(r.row(1), &[1, 2]);

    // An annotation on a bitmap is dropped rather than applied.
    let header = probe(b"P4\n# tile 8 8\n8 1\n\xff").unwrap();
    assert!(!header.is_tiled());
}

#[test]
fn tile_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("plain.ppm");
    let dst = dir.path().join("tiled.ppm");
    let raster = checkerboard(40, 25, PixelLayout::Rgb8);
    std::fs::write(&src, encode(&raster, PnmFormat::PpmBinary, Unstoppable).unwrap()).unwrap();

    let header = tile_file(&src, &dst, 16, 16, Unstoppable).unwrap();
    assert!(header.is_tiled());
    let mut source = ByteSource::open(&dst).unwrap();
    let decoded = DecodeRequest::new(&mut source)
        .expect(PnmFormat::PpmBinary)
        .decode(Unstoppable)
        .unwrap();
    assert_eq!(decoded, raster);
}

#[test]
fn export_collapses_single_tile() {
    let raster = checkerboard(10, 10, PixelLayout::Gray8);
    match export_tiles(raster.clone(), 10, 10).unwrap() {
        TiledRaster::Single(r) => assert_eq!(r, raster),
        TiledRaster::Group(_) => panic!("one tile must not be grouped"),
    }
    let TiledRaster::Group(tiles) = export_tiles(raster.clone(), 4, 4).unwrap() else {
        panic!("expected a group");
    };
    assert_eq!(tiles.len(), 9);
    let covered: u32 = tiles
        .iter()
        .map(|t| t.raster.width() * t.raster.height())
        .sum();
    assert_eq!(covered, 100);
    for t in &tiles {
        let rect = PixelRect {
            x0: t.x,
            y0: t.y,
            x1: t.x + t.raster.width() - 1,
            y1: t.y + t.raster.height() - 1,
        };
        assert_eq!(t.raster, raster.crop(rect).unwrap());
    }
}

// ── Malformed input ──────────────────────────────────────────────────

#[test]
fn malformed_headers_fail_cleanly() {
    let cases: &[&[u8]] = &[
        b"",
        b"P",
        b"P6",
        b"P6\n",
        b"P6\n2",
        b"P6\n2 2",
        b"P6\n2 2\n",
        b"P6\n-2 2\n255\n",
        b"P6\n2 2\n256\n",
        b"P6\n2 2\n0\n",
        b"P7\n2 2\n255\n",
        b"Pf\n1 1\n-1.0\n",
    ];
    for data in cases {
        assert!(
            decode(data, Unstoppable).is_err(),
            "{:?} should not decode",
            String::from_utf8_lossy(data)
        );
    }
}

#[test]
fn oversized_headers_are_typed_errors() {
    assert!(matches!(
        decode(b"P5\n4000000000 4000000000\n255\n", Unstoppable),
        Err(IngestError::DimensionsTooLarge { .. })
    ));
    assert!(matches!(
        decode(b"P6\n3000000000 3000000000\n255\n", Unstoppable),
        Err(IngestError::DimensionsTooLarge { .. })
    ));
    // Allocatable, yet far beyond the bytes present.
    assert!(matches!(
        decode(b"P5\n70000 70000\n255\n\x00", Unstoppable),
        Err(IngestError::UnexpectedEof)
    ));
    assert!(matches!(
        decode_region(
            b"P5\n70000 70000\n255\n\x00",
            Region::new(0, 0, 9, 9),
            Unstoppable
        ),
        Err(IngestError::UnexpectedEof)
    ));
}

#[test]
fn truncated_data_fails() {
    let raster = noise(8, 8, PixelLayout::Rgb8);
    let encoded = encode(&raster, PnmFormat::PpmBinary, Unstoppable).unwrap();
    for cut in [encoded.len() - 1, encoded.len() / 2] {
        assert!(matches!(
            decode(&encoded[..cut], Unstoppable),
            Err(IngestError::UnexpectedEof)
        ));
    }
}
