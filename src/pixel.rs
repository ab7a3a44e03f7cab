/// Pixel memory layout of a [`Raster`](crate::Raster).
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    /// One byte per pixel holding 0 or 1; 1 is black, as in PBM.
    Bit1,
    /// Single channel, 8-bit grayscale.
    Gray8,
    /// Single channel, 16-bit grayscale (native endian).
    Gray16,
    /// 3 channels, 8-bit RGB.
    Rgb8,
    /// 3 channels, 16-bit RGB (native endian).
    Rgb16,
}

impl PixelLayout {
    /// Bytes per pixel for this layout.
    pub fn bytes_per_pixel(&self) -> usize {
        self.channels() * self.bytes_per_sample()
    }

    /// Number of channels.
    pub fn channels(&self) -> usize {
        match self {
            Self::Bit1 | Self::Gray8 | Self::Gray16 => 1,
            Self::Rgb8 | Self::Rgb16 => 3,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            Self::Gray16 | Self::Rgb16 => 2,
            Self::Bit1 | Self::Gray8 | Self::Rgb8 => 1,
        }
    }

    /// Largest sample value the layout holds.
    pub fn maxval(&self) -> u16 {
        match self {
            Self::Bit1 => 1,
            Self::Gray8 | Self::Rgb8 => 255,
            Self::Gray16 | Self::Rgb16 => 65535,
        }
    }
}
