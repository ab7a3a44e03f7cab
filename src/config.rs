//! Pipeline settings: which external commands run, and for how long.

use std::collections::HashMap;
use std::time::Duration;

use crate::classify::{Compression, RasterContainer};
use crate::filter::{DEFAULT_FILTER_TIMEOUT, FilterConfig};
use crate::limits::Limits;

/// Settings for [`Ingest`](crate::Ingest).
///
/// Commands are shell command lines reading stdin and writing stdout.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Kill any filter running longer than this (default 120 s).
    pub filter_timeout: Option<Duration>,
    /// How many compressed containers may wrap each other (default 4).
    pub max_decompress_depth: usize,
    /// Overrides for [`Compression::default_command`].
    pub decompressors: HashMap<Compression, String>,
    /// Overrides for [`RasterContainer::default_converter`].
    pub converters: HashMap<RasterContainer, String>,
    /// Renders PostScript to PNM. `None` rejects PostScript input.
    pub postscript_converter: Option<String>,
    /// Tried on input nothing recognized. `None` rejects it.
    pub fallback_converter: Option<String>,
    /// Fetches a URL to stdout; the quoted URL is appended.
    pub fetch_command: String,
    pub limits: Limits,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            filter_timeout: Some(DEFAULT_FILTER_TIMEOUT),
            max_decompress_depth: 4,
            decompressors: HashMap::new(),
            converters: HashMap::new(),
            postscript_converter: Some(
                "gs -q -dSAFER -dBATCH -dNOPAUSE -sDEVICE=ppmraw -sOutputFile=- -".into(),
            ),
            fallback_converter: Some("anytopnm".into()),
            fetch_command: "curl -sfL".into(),
            limits: Limits::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_filter_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.filter_timeout = timeout;
        self
    }

    pub fn with_max_decompress_depth(mut self, depth: usize) -> Self {
        self.max_decompress_depth = depth;
        self
    }

    pub fn with_decompressor(mut self, compression: Compression, command: impl Into<String>) -> Self {
        self.decompressors.insert(compression, command.into());
        self
    }

    pub fn with_converter(mut self, container: RasterContainer, command: impl Into<String>) -> Self {
        self.converters.insert(container, command.into());
        self
    }

    pub fn with_postscript_converter(mut self, command: Option<String>) -> Self {
        self.postscript_converter = command;
        self
    }

    pub fn with_fallback_converter(mut self, command: Option<String>) -> Self {
        self.fallback_converter = command;
        self
    }

    pub fn with_fetch_command(mut self, command: impl Into<String>) -> Self {
        self.fetch_command = command.into();
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Command that decompresses `compression`.
    pub fn decompressor(&self, compression: Compression) -> &str {
        self.decompressors
            .get(&compression)
            .map(String::as_str)
            .unwrap_or_else(|| compression.default_command())
    }

    /// Command that converts `container` to PNM.
    pub fn converter(&self, container: RasterContainer) -> &str {
        self.converters
            .get(&container)
            .map(String::as_str)
            .unwrap_or_else(|| container.default_converter())
    }

    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            timeout: self.filter_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win_over_defaults() {
        let config = PipelineConfig::default()
            .with_decompressor(Compression::Bzip2, "lbzip2 -dc")
            .with_filter_timeout(None);
        assert_eq!(config.decompressor(Compression::Bzip2), "lbzip2 -dc");
        assert_eq!(config.decompressor(Compression::Gzip), "gzip -dc");
        assert_eq!(config.converter(RasterContainer::Gif), "giftopnm");
        assert_eq!(config.filter_config().timeout, None);
    }
}
