//! End-to-end loading: fetch, decompress, convert, decode.

use std::path::Path;

use enough::Stop;

use crate::classify::{self, Classification, Compression, FormatTag};
use crate::config::PipelineConfig;
use crate::decode::DecodeRequest;
use crate::decompress::{DecompressMode, decompress_if_needed};
use crate::error::IngestError;
use crate::filter::{self, FilterInput};
use crate::pnm::{self, RasterHeader};
use crate::raster::Raster;
use crate::region::Region;
use crate::source::ByteSource;

/// One step the input went through before decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Fetched { command: String },
    Decompressed {
        compression: Compression,
        mode: DecompressMode,
    },
    Converted { command: String },
}

/// A decoded image and how it was obtained.
#[derive(Debug)]
pub struct Ingested {
    pub raster: Raster,
    /// Header of the PNM stream that was decoded.
    pub header: RasterHeader,
    /// Format of the input once decompressed, before any conversion.
    pub format: FormatTag,
    /// Creator label found during classification.
    pub creator: Option<String>,
    pub stages: Vec<Stage>,
}

/// Header-only result of a probe.
#[derive(Debug)]
pub struct Probed {
    pub header: RasterHeader,
    pub format: FormatTag,
    pub creator: Option<String>,
    pub stages: Vec<Stage>,
}

/// A PNM stream positioned at its first sample.
struct Resolved {
    source: ByteSource,
    header: RasterHeader,
    format: FormatTag,
    creator: Option<String>,
    stages: Vec<Stage>,
}

/// Loads images of any recognized format, using external tools for what
/// cannot be decoded here.
///
/// ```no_run
/// use zeningest::{Ingest, PipelineConfig, Unstoppable};
///
/// let ingest = Ingest::new(PipelineConfig::default());
/// let loaded = ingest.load("photo.jpg.gz", None, Unstoppable)?;
/// println!("{}x{} via {:?}", loaded.raster.width(), loaded.raster.height(), loaded.stages);
/// # Ok::<(), zeningest::IngestError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct Ingest {
    config: PipelineConfig,
}

impl Ingest {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load a URL or a file path.
    pub fn load(
        &self,
        input: &str,
        region: Option<Region>,
        stop: impl Stop,
    ) -> Result<Ingested, IngestError> {
        if is_url(input) {
            self.load_url(input, region, stop)
        } else {
            self.load_path(input, region, stop)
        }
    }

    pub fn load_path(
        &self,
        path: impl AsRef<Path>,
        region: Option<Region>,
        stop: impl Stop,
    ) -> Result<Ingested, IngestError> {
        let path = path.as_ref();
        let source = ByteSource::open(path)?;
        let resolved = self.resolve(source, Some(path), Vec::new())?;
        self.finish_load(resolved, region, stop)
    }

    /// Fetch `url` with the configured fetch command, then load the result.
    pub fn load_url(
        &self,
        url: &str,
        region: Option<Region>,
        stop: impl Stop,
    ) -> Result<Ingested, IngestError> {
        let (source, stage) = self.fetch(url)?;
        let resolved = self.resolve(source, None, vec![stage])?;
        self.finish_load(resolved, region, stop)
    }

    pub fn load_source(
        &self,
        source: ByteSource,
        region: Option<Region>,
        stop: impl Stop,
    ) -> Result<Ingested, IngestError> {
        let resolved = self.resolve(source, None, Vec::new())?;
        self.finish_load(resolved, region, stop)
    }

    /// Read only as far as the PNM header.
    pub fn probe_path(&self, path: impl AsRef<Path>) -> Result<Probed, IngestError> {
        let path = path.as_ref();
        let source = ByteSource::open(path)?;
        Ok(self.resolve(source, Some(path), Vec::new())?.into_probed())
    }

    pub fn probe_source(&self, source: ByteSource) -> Result<Probed, IngestError> {
        Ok(self.resolve(source, None, Vec::new())?.into_probed())
    }

    fn fetch(&self, url: &str) -> Result<(ByteSource, Stage), IngestError> {
        let command = format!("{} {}", self.config.fetch_command, shell_quote(url));
        log::debug!("ingest: fetching with `{command}`");
        let process = filter::spawn(&command, FilterInput::Null, &self.config.filter_config())?;
        Ok((ByteSource::from_reader(process), Stage::Fetched { command }))
    }

    /// Strip compression, convert foreign formats, and parse the PNM header.
    fn resolve(
        &self,
        source: ByteSource,
        path_hint: Option<&Path>,
        mut stages: Vec<Stage>,
    ) -> Result<Resolved, IngestError> {
        let decompressed = decompress_if_needed(source, path_hint, &self.config)?;
        let last_decompressor = decompressed
            .layers
            .last()
            .map(|(compression, _)| self.config.decompressor(*compression).to_owned());
        stages.extend(
            decompressed
                .layers
                .iter()
                .map(|&(compression, mode)| Stage::Decompressed { compression, mode }),
        );
        let mut source = decompressed.source;
        let Classification {
            tag,
            creator,
            preamble,
        } = decompressed.classification;

        if preamble.is_empty() && source.peek(1)?.is_empty() {
            return Err(match last_decompressor {
                Some(command) => IngestError::FilterOutput { command },
                None => IngestError::UnexpectedEof,
            });
        }

        let converter = match tag {
            FormatTag::Pnm(_) | FormatTag::Compressed(_) => None,
            FormatTag::Raster(container) => Some(self.config.converter(container).to_owned()),
            FormatTag::PostScript => {
                source.unread(&preamble);
                Some(
                    self.config
                        .postscript_converter
                        .clone()
                        .ok_or(IngestError::NoConverter(tag))?,
                )
            }
            FormatTag::Foreign => Some(
                self.config
                    .fallback_converter
                    .clone()
                    .ok_or(IngestError::UnrecognizedFormat)?,
            ),
        };

        if let Some(command) = converter {
            log::debug!("ingest: converting {tag:?} with `{command}`");
            source = filter::run_filter(source, &command, &self.config.filter_config())?;
            // Surface read failures here; classification would mask them.
            if source.peek(2)?.is_empty() {
                return Err(IngestError::FilterOutput { command });
            }
            let converted = classify::classify(&mut source);
            if !matches!(converted.tag, FormatTag::Pnm(_)) {
                log::warn!(
                    "ingest: `{command}` produced {:?} instead of PNM",
                    converted.tag
                );
                return Err(IngestError::FilterOutput { command });
            }
            stages.push(Stage::Converted { command });
        }

        let header = pnm::parse_header(&mut source)?;
        Ok(Resolved {
            source,
            header,
            format: tag,
            creator,
            stages,
        })
    }

    fn finish_load(
        &self,
        mut resolved: Resolved,
        region: Option<Region>,
        stop: impl Stop,
    ) -> Result<Ingested, IngestError> {
        let mut request = DecodeRequest::new(&mut resolved.source).with_limits(&self.config.limits);
        if let Some(region) = region {
            request = request.with_region(region);
        }
        let raster = request.decode_with_header(&resolved.header, stop)?;
        // Reap any filters before handing the raster back.
        drop(resolved.source);
        Ok(Ingested {
            raster,
            header: resolved.header,
            format: resolved.format,
            creator: resolved.creator,
            stages: resolved.stages,
        })
    }
}

impl Resolved {
    fn into_probed(self) -> Probed {
        Probed {
            header: self.header,
            format: self.format,
            creator: self.creator,
            stages: self.stages,
        }
    }
}

/// True for `scheme://...` where the scheme starts with a letter.
pub fn is_url(input: &str) -> bool {
    let Some((scheme, rest)) = input.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
}

/// Quote `arg` for `sh`.
pub(crate) fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pnm::PnmFormat;
    use enough::Unstoppable;

    #[test]
    fn url_pattern() {
        assert!(is_url("http://example.com/a.gif"));
        assert!(is_url("svn+ssh://host/x"));
        assert!(!is_url("/tmp/a.pgm"));
        assert!(!is_url("C:\\images\\a.ppm"));
        assert!(!is_url("://nothing"));
        assert!(!is_url("9p://host/x"));
        assert!(!is_url("http://"));
    }

    #[test]
    fn quoting_survives_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn native_pnm_needs_no_stages() {
        let ingest = Ingest::default();
        let source = ByteSource::from_bytes(b"P2\n2 1\n255\n10 20\n".to_vec());
        let loaded = ingest.load_source(source, None, Unstoppable).unwrap();
        assert!(loaded.stages.is_empty());
        assert_eq!(loaded.format, FormatTag::Pnm(PnmFormat::PgmAscii));
        assert_eq!(loaded.raster.pixels(), &[10, 20]);
    }

    #[test]
    fn missing_converters_are_typed_errors() {
        let ingest = Ingest::new(
            PipelineConfig::default()
                .with_postscript_converter(None)
                .with_fallback_converter(None),
        );
        let ps = ByteSource::from_bytes(b"%!PS\n%%EndComments\n".to_vec());
        assert!(matches!(
            ingest.probe_source(ps),
            Err(IngestError::NoConverter(FormatTag::PostScript))
        ));
        let junk = ByteSource::from_bytes(b"hello world\n".to_vec());
        assert!(matches!(
            ingest.probe_source(junk),
            Err(IngestError::UnrecognizedFormat)
        ));
        let empty = ByteSource::from_bytes(Vec::new());
        assert!(matches!(
            ingest.probe_source(empty),
            Err(IngestError::UnexpectedEof)
        ));
    }
}
