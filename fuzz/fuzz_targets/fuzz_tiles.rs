#![no_main]
use libfuzzer_sys::fuzz_target;
use zeningest::*;

fuzz_target!(|input: (u8, u8, &[u8])| {
    let (tw, th, data) = input;
    let Ok(full) = decode(data, enough::Unstoppable) else {
        return;
    };
    let format = match full.layout() {
        PixelLayout::Gray8 | PixelLayout::Gray16 => PnmFormat::PgmBinary,
        PixelLayout::Rgb8 | PixelLayout::Rgb16 => PnmFormat::PpmBinary,
        _ => return,
    };
    let plain = encode(&full, format, enough::Unstoppable).unwrap();

    // Tiling then decoding must reproduce the image exactly
    let mut tiled = Vec::new();
    let mut source = ByteSource::from_bytes(plain);
    write_tiled(&mut source, &mut tiled, u32::from(tw), u32::from(th), enough::Unstoppable)
        .unwrap();
    let back = decode(&tiled, enough::Unstoppable).unwrap();
    assert_eq!(back, full, "tiled round trip mismatch");
});
