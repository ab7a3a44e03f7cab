#![no_main]
use libfuzzer_sys::fuzz_target;
use zeningest::*;

fuzz_target!(|data: &[u8]| {
    // Classification never fails and must leave the input intact
    let mut source = ByteSource::from_bytes(data.to_vec());
    let c = classify(&mut source);
    if c.tag != FormatTag::PostScript {
        let mut rest = Vec::new();
        std::io::Read::read_to_end(&mut source, &mut rest).unwrap();
        assert_eq!(rest, data, "classification consumed input");
    }

    // Full and region decode must never panic
    let Ok(full) = decode(data, enough::Unstoppable) else {
        return;
    };
    let region = Region::new(-3, 2, i64::from(full.width()) / 2, i64::MAX);
    let part = decode_region(data, region, enough::Unstoppable)
        .expect("region decode failed where full decode succeeded");
    let rect = region.clamp(full.width(), full.height());
    assert_eq!(full.crop(rect).unwrap(), part, "region differs from crop");
});
