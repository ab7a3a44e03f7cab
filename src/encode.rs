use std::io::Write;

use enough::Stop;

use crate::error::IngestError;
use crate::pnm::{self, PnmFormat};
use crate::raster::Raster;

/// Builder for encoding a [`Raster`] as PNM.
#[derive(Clone, Copy, Debug)]
pub struct EncodeRequest {
    format: PnmFormat,
}

impl EncodeRequest {
    pub fn pnm(format: PnmFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> PnmFormat {
        self.format
    }

    /// Encode to a byte vector.
    pub fn encode(&self, raster: &Raster, stop: impl Stop) -> Result<Vec<u8>, IngestError> {
        pnm::encode_pnm(raster, self.format, &stop)
    }

    /// Encode into `out`.
    pub fn encode_to<W: Write>(
        &self,
        raster: &Raster,
        out: &mut W,
        stop: impl Stop,
    ) -> Result<(), IngestError> {
        let bytes = pnm::encode_pnm(raster, self.format, &stop)?;
        out.write_all(&bytes)?;
        Ok(())
    }
}
