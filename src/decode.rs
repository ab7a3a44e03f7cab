use enough::Stop;

use crate::error::IngestError;
use crate::limits::Limits;
use crate::pnm::{self, PnmFormat, RasterHeader};
use crate::raster::Raster;
use crate::region::{PixelRect, Region};
use crate::source::ByteSource;

/// Builder for decoding a PNM stream.
///
/// ```no_run
/// use zeningest::{ByteSource, DecodeRequest, Region, Unstoppable};
///
/// let mut source = ByteSource::open("scan.pgm")?;
/// let raster = DecodeRequest::new(&mut source)
///     .with_region(Region::new(0, 0, 63, 63))
///     .decode(Unstoppable)?;
/// # Ok::<(), zeningest::IngestError>(())
/// ```
pub struct DecodeRequest<'a> {
    source: &'a mut ByteSource,
    region: Option<Region>,
    limits: Option<&'a Limits>,
    expected: Option<PnmFormat>,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(source: &'a mut ByteSource) -> Self {
        Self {
            source,
            region: None,
            limits: None,
            expected: None,
        }
    }

    /// Decode only this window (raster coordinates, y from the bottom).
    ///
    /// The window is clamped into the image, never rejected.
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    pub fn with_limits(mut self, limits: &'a Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Fail with [`IngestError::FormatMismatch`] unless the stream is `format`.
    pub fn expect(mut self, format: PnmFormat) -> Self {
        self.expected = Some(format);
        self
    }

    /// Read and validate the header only.
    pub fn probe(self) -> Result<RasterHeader, IngestError> {
        let header = pnm::parse_header(self.source)?;
        check_expected(self.expected, &header)?;
        Ok(header)
    }

    /// Read the header, then decode.
    pub fn decode(self, stop: impl Stop) -> Result<Raster, IngestError> {
        let header = pnm::parse_header(self.source)?;
        self.decode_with_header(&header, stop)
    }

    /// Decode samples for a header already read from this source.
    pub fn decode_with_header(
        self,
        header: &RasterHeader,
        stop: impl Stop,
    ) -> Result<Raster, IngestError> {
        check_expected(self.expected, header)?;
        let rect = match self.region {
            Some(region) => region.clamp(header.width, header.height),
            None => PixelRect::full(header.width, header.height),
        };
        if let Some(limits) = self.limits {
            limits.check(rect.width(), rect.height())?;
        }
        pnm::decode(self.source, header, rect, self.limits, &stop)
    }
}

fn check_expected(expected: Option<PnmFormat>, header: &RasterHeader) -> Result<(), IngestError> {
    match expected {
        Some(expected) if expected != header.format => Err(IngestError::FormatMismatch {
            expected,
            actual: header.format,
        }),
        _ => Ok(()),
    }
}
