//! Decoded pixel buffers.

#[cfg(feature = "rgb")]
use rgb::AsPixels as _;

use crate::error::IngestError;
use crate::limits::Limits;
use crate::pixel::PixelLayout;
use crate::region::PixelRect;

/// A decoded image, owned by the caller.
///
/// Rows are stored bottom-up: row 0 is the bottom scanline, matching the
/// order in which the codec hands rows out. Samples are raw (not scaled);
/// 16-bit samples are native-endian.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    layout: PixelLayout,
}

impl Raster {
    /// Zero-filled raster.
    pub fn new(width: u32, height: u32, layout: PixelLayout) -> Result<Self, IngestError> {
        let len = buffer_len(width, height, layout)?;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| IngestError::DimensionsTooLarge { width, height })?;
        pixels.resize(len, 0);
        Ok(Self {
            pixels,
            width,
            height,
            layout,
        })
    }

    /// Wrap an existing bottom-up pixel buffer.
    pub fn from_pixels(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<Self, IngestError> {
        let len = buffer_len(width, height, layout)?;
        if pixels.len() != len {
            return Err(IngestError::InvalidData(format!(
                "{}x{} {:?} needs {len} bytes, got {}",
                width,
                height,
                layout,
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            width,
            height,
            layout,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn maxval(&self) -> u16 {
        self.layout.maxval()
    }

    /// Access the pixel data.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.layout.bytes_per_pixel()
    }

    /// Row `y`, counted from the bottom.
    pub fn row(&self, y: u32) -> &[u8] {
        let rb = self.row_bytes();
        let start = y as usize * rb;
        &self.pixels[start..start + rb]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let rb = self.row_bytes();
        let start = y as usize * rb;
        &mut self.pixels[start..start + rb]
    }

    fn sample_offset(&self, x: u32, y: u32, channel: usize) -> usize {
        debug_assert!(x < self.width && y < self.height && channel < self.layout.channels());
        let px = y as usize * self.width as usize + x as usize;
        (px * self.layout.channels() + channel) * self.layout.bytes_per_sample()
    }

    /// Raw sample at `(x, y)` (y from the bottom).
    ///
    /// # Panics
    ///
    /// Panics if the coordinates or channel are out of range.
    pub fn sample(&self, x: u32, y: u32, channel: usize) -> u16 {
        let off = self.sample_offset(x, y, channel);
        match self.layout.bytes_per_sample() {
            2 => u16::from_ne_bytes([self.pixels[off], self.pixels[off + 1]]),
            _ => u16::from(self.pixels[off]),
        }
    }

    pub fn set_sample(&mut self, x: u32, y: u32, channel: usize, value: u16) {
        let off = self.sample_offset(x, y, channel);
        match self.layout.bytes_per_sample() {
            2 => self.pixels[off..off + 2].copy_from_slice(&value.to_ne_bytes()),
            _ => self.pixels[off] = value.min(255) as u8,
        }
    }

    /// Sample scaled to `[0, 1]` by the layout's maxval.
    pub fn normalized(&self, x: u32, y: u32, channel: usize) -> f32 {
        f32::from(self.sample(x, y, channel)) / f32::from(self.maxval())
    }

    /// Every sample scaled to `[0, 1]`, in storage order.
    pub fn to_f32(&self) -> Vec<f32> {
        let max = f32::from(self.maxval());
        match self.layout.bytes_per_sample() {
            2 => self
                .pixels
                .chunks_exact(2)
                .map(|c| f32::from(u16::from_ne_bytes([c[0], c[1]])) / max)
                .collect(),
            _ => self.pixels.iter().map(|&v| f32::from(v) / max).collect(),
        }
    }

    /// Copy out a sub-rectangle (raster coordinates, y from the bottom).
    pub fn crop(&self, rect: PixelRect) -> Result<Raster, IngestError> {
        if rect.x1 >= self.width || rect.y1 >= self.height {
            return Err(IngestError::InvalidData(format!(
                "crop {rect:?} outside {}x{}",
                self.width, self.height
            )));
        }
        if rect == PixelRect::full(self.width, self.height) {
            return Ok(self.clone());
        }
        let bpp = self.layout.bytes_per_pixel();
        let lead = rect.x0 as usize * bpp;
        let take = rect.width() as usize * bpp;
        let mut pixels = Vec::with_capacity(take * rect.height() as usize);
        for y in rect.y0..=rect.y1 {
            pixels.extend_from_slice(&self.row(y)[lead..lead + take]);
        }
        Ok(Raster {
            pixels,
            width: rect.width(),
            height: rect.height(),
            layout: self.layout,
        })
    }

    #[cfg(feature = "rgb")]
    fn expect_layout(&self, expected: PixelLayout) -> Result<(), IngestError> {
        if self.layout != expected {
            return Err(IngestError::LayoutMismatch {
                expected,
                actual: self.layout,
            });
        }
        Ok(())
    }

    /// Reinterpret an `Rgb8` raster as typed pixels.
    ///
    /// Returns [`IngestError::LayoutMismatch`] for any other layout.
    #[cfg(feature = "rgb")]
    pub fn as_rgb8(&self) -> Result<&[rgb::RGB8], IngestError> {
        self.expect_layout(PixelLayout::Rgb8)?;
        Ok(self.pixels.as_pixels())
    }

    /// Copy an `Rgb16` raster out as typed pixels.
    #[cfg(feature = "rgb")]
    pub fn to_rgb16(&self) -> Result<Vec<rgb::RGB16>, IngestError> {
        self.expect_layout(PixelLayout::Rgb16)?;
        Ok(self
            .pixels
            .chunks_exact(6)
            .map(|c| rgb::RGB16 {
                r: u16::from_ne_bytes([c[0], c[1]]),
                g: u16::from_ne_bytes([c[2], c[3]]),
                b: u16::from_ne_bytes([c[4], c[5]]),
            })
            .collect())
    }

    /// Zero-copy 2D view of a `Gray8` raster (rows bottom-up).
    #[cfg(feature = "imgref")]
    pub fn as_imgref_gray8(&self) -> Result<imgref::ImgRef<'_, u8>, IngestError> {
        self.expect_layout(PixelLayout::Gray8)?;
        Ok(imgref::ImgRef::new(
            &self.pixels,
            self.width as usize,
            self.height as usize,
        ))
    }

    /// Zero-copy 2D view of an `Rgb8` raster (rows bottom-up).
    #[cfg(feature = "imgref")]
    pub fn as_imgref_rgb8(&self) -> Result<imgref::ImgRef<'_, rgb::RGB8>, IngestError> {
        let pixels = self.as_rgb8()?;
        Ok(imgref::ImgRef::new(
            pixels,
            self.width as usize,
            self.height as usize,
        ))
    }
}

fn buffer_len(width: u32, height: u32, layout: PixelLayout) -> Result<usize, IngestError> {
    Limits::NONE.raster_bytes(width, height, layout)
}
