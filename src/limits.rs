//! Bounds on what a single decode may allocate.

use crate::error::IngestError;
use crate::pixel::PixelLayout;

/// Caller-imposed ceilings, checked after the header is parsed and before
/// any pixel memory is reserved.
///
/// `None` leaves a bound open. Open bounds still never request more than
/// `isize::MAX` bytes; larger rasters fail with
/// [`IngestError::DimensionsTooLarge`].
#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub max_width: Option<u64>,
    pub max_height: Option<u64>,
    /// Maximum pixel count (width * height) of the decoded region.
    pub max_pixels: Option<u64>,
    /// Maximum bytes of the decoded raster.
    pub max_memory_bytes: Option<u64>,
}

fn within(what: &str, value: u64, max: Option<u64>) -> Result<(), IngestError> {
    match max {
        Some(max) if value > max => Err(IngestError::LimitExceeded(format!(
            "{what} {value} exceeds limit {max}"
        ))),
        _ => Ok(()),
    }
}

impl Limits {
    pub(crate) const NONE: Limits = Limits {
        max_width: None,
        max_height: None,
        max_pixels: None,
        max_memory_bytes: None,
    };

    pub(crate) fn check(&self, width: u32, height: u32) -> Result<(), IngestError> {
        within("width", u64::from(width), self.max_width)?;
        within("height", u64::from(height), self.max_height)?;
        within(
            "pixel count",
            u64::from(width) * u64::from(height),
            self.max_pixels,
        )
    }

    /// Byte size of a `width`x`height` raster in `layout`, once it is known
    /// to be allocatable and within `max_memory_bytes`.
    pub(crate) fn raster_bytes(
        &self,
        width: u32,
        height: u32,
        layout: PixelLayout,
    ) -> Result<usize, IngestError> {
        let bytes = u64::from(width)
            .checked_mul(u64::from(height))
            .and_then(|px| px.checked_mul(layout.bytes_per_pixel() as u64))
            .and_then(|b| usize::try_from(b).ok())
            .filter(|&b| b <= isize::MAX as usize)
            .ok_or(IngestError::DimensionsTooLarge { width, height })?;
        within("raster size in bytes", bytes as u64, self.max_memory_bytes)?;
        Ok(bytes)
    }
}
