#!/usr/bin/env -S cargo +nightly -Zscript
//! Generate seed corpus files for fuzzing.
//! Run: cargo +nightly -Zscript fuzz/generate_seeds.rs

fn main() {
    use std::fs;
    let dir = "fuzz/corpus/fuzz_decode";
    fs::create_dir_all(dir).unwrap();

    // PPM 2x2
    let ppm = b"P6\n2 2\n255\n\xff\x00\x00\x00\xff\x00\x00\x00\xff\x80\x80\x80";
    fs::write(format!("{dir}/ppm_2x2.ppm"), ppm).unwrap();

    // PGM 3x2, width and height split across lines
    let pgm = b"P5\n# seed\n3\n2\n255\n\x00\x40\x80\xc0\xff\x64";
    fs::write(format!("{dir}/pgm_3x2.pgm"), pgm).unwrap();

    // 16-bit PGM 1x2
    let pgm16 = b"P5\n1 2\n65535\n\x12\x34\xff\xff";
    fs::write(format!("{dir}/pgm16_1x2.pgm"), pgm16).unwrap();

    // Tiled PGM 3x3 in 2x2 tiles
    let mut tiled = b"P5\n# tile 2 2\n3 3\n255\n".to_vec();
    tiled.extend(0u8..9);
    fs::write(format!("{dir}/tiled_3x3.pgm"), tiled).unwrap();

    // ASCII variants
    fs::write(format!("{dir}/pbm_ascii.pbm"), b"P1\n3 2\n010\n1 1 0\n").unwrap();
    fs::write(format!("{dir}/pgm_ascii.pgm"), b"P2\n2 2\n255\n0 # c\n64 128 255\n").unwrap();
    fs::write(format!("{dir}/ppm_ascii.ppm"), b"P3\n1 1\n65535\n1 2 3\n").unwrap();

    // Binary PBM 10x2
    fs::write(format!("{dir}/pbm_10x2.pbm"), b"P4\n10 2\n\xa0\x40\x01\xc0").unwrap();

    // Truncated/malformed seeds for edge coverage
    fs::write(format!("{dir}/empty.bin"), b"").unwrap();
    fs::write(format!("{dir}/just_p6.bin"), b"P6").unwrap();
    fs::write(format!("{dir}/bad_maxval.bin"), b"P5\n2 2\n1000\n\x00").unwrap();
    fs::write(format!("{dir}/zero_tile.bin"), b"P5\n# tile 0 4\n2 2\n255\n").unwrap();
    fs::write(format!("{dir}/gzip_magic.bin"), b"\x1f\x8b\x08\x00").unwrap();
    fs::write(format!("{dir}/postscript.bin"), b"%!PS\n%%Creator: seed\n").unwrap();

    println!("Generated seed corpus in {dir}/");
}
