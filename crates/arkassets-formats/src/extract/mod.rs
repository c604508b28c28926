//! Embedded asset extraction
//!
//! Scans a decoded payload for known signatures (PNG, JPEG, RIFF, Ogg, MP3,
//! JSON and XML runs), estimates each asset's extent, and writes the assets to
//! an unpack directory. Text assets go through the text-asset decryption path
//! before they are written.
//!
//! Extraction is best effort. A failure on one asset is logged and the rest
//! still get written.

mod error;
mod materialize;
mod recognizer;
mod sniff;

pub use error::{ExtractResult, ExtractionError};
pub use materialize::{UnpackReport, materialize, render_text, unpack, unpack_dir};
pub use recognizer::{
    JpegRecognizer, JsonRecognizer, Mp3Recognizer, OggRecognizer, PngRecognizer, RiffRecognizer,
    SignatureRecognizer, XmlRecognizer, default_recognizers,
};
pub use sniff::sniff_whole;

use crate::bundle::DecodedPayload;
use tracing::debug;

/// Scanning stops this many bytes before the end of the payload
pub const SCAN_TAIL: usize = 16;

/// Asset category, used for naming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Images
    Texture,
    /// JSON, XML and other text
    Text,
    /// Sound
    Audio,
}

impl AssetKind {
    /// Name prefix for extracted files
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Texture => "texture",
            Self::Text => "text",
            Self::Audio => "audio",
        }
    }
}

/// Concrete asset format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum AssetFormat {
    Png,
    Jpeg,
    Gif,
    Dds,
    Wav,
    Ogg,
    Mp3,
    Json,
    Xml,
    /// Printable text that is neither JSON nor XML
    Text,
}

impl AssetFormat {
    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Dds => "dds",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Text => "txt",
        }
    }

    /// Category of this format
    pub fn kind(self) -> AssetKind {
        match self {
            Self::Png | Self::Jpeg | Self::Gif | Self::Dds => AssetKind::Texture,
            Self::Wav | Self::Ogg | Self::Mp3 => AssetKind::Audio,
            Self::Json | Self::Xml | Self::Text => AssetKind::Text,
        }
    }
}

/// One asset located inside a payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAsset {
    /// Category
    pub kind: AssetKind,
    /// Detected format
    pub format: AssetFormat,
    /// Start offset in the payload
    pub offset: usize,
    /// Length in bytes
    pub size: usize,
    /// Output name without extension, e.g. `texture_3`
    pub name: String,
}

impl ExtractedAsset {
    fn new(format: AssetFormat, offset: usize, size: usize, index: usize) -> Self {
        let kind = format.kind();
        Self {
            kind,
            format,
            offset,
            size,
            name: format!("{}_{}", kind.prefix(), index),
        }
    }

    /// Exclusive end offset
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Signature scanner over a set of recognizers
pub struct Scanner {
    recognizers: Vec<Box<dyn SignatureRecognizer>>,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::with_recognizers(default_recognizers())
    }
}

impl Scanner {
    /// Scanner using exactly `recognizers`, tried in order at each position
    pub fn with_recognizers(recognizers: Vec<Box<dyn SignatureRecognizer>>) -> Self {
        Self { recognizers }
    }

    /// Register an additional recognizer with the lowest priority
    pub fn register(&mut self, recognizer: Box<dyn SignatureRecognizer>) {
        self.recognizers.push(recognizer);
    }

    /// Scan `buf` for embedded assets.
    ///
    /// Results are in ascending offset order and never overlap: after a hit the
    /// cursor moves past the matched extent.
    pub fn scan(&self, buf: &[u8]) -> Vec<ExtractedAsset> {
        let mut assets = Vec::new();
        let stop = buf.len().saturating_sub(SCAN_TAIL);
        let mut i = 0;

        while i < stop {
            let hit = self
                .recognizers
                .iter()
                .filter(|r| r.matches(buf, i))
                .find_map(|r| r.extent(buf, i).map(|size| (r.format(), size)));

            match hit {
                Some((format, size)) if size > 0 => {
                    debug!("Found {:?} at offset {}, size {}", format, i, size);
                    assets.push(ExtractedAsset::new(format, i, size, assets.len()));
                    i += size;
                }
                _ => i += 1,
            }
        }
        assets
    }

    /// Locate the assets in a decoded payload.
    ///
    /// Payloads that did not come from a parsed bundle are first sniffed as a
    /// whole; structured payloads are scanned, and sniffed only when the scan
    /// comes up empty.
    pub fn extract(&self, payload: &DecodedPayload) -> Vec<ExtractedAsset> {
        let whole = || {
            sniff_whole(&payload.data)
                .map(|format| vec![ExtractedAsset::new(format, 0, payload.len(), 0)])
        };

        if !payload.path.is_structured()
            && let Some(assets) = whole()
        {
            return assets;
        }

        let assets = self.scan(&payload.data);
        if assets.is_empty() && payload.path.is_structured() {
            return whole().unwrap_or_default();
        }
        assets
    }
}

/// Locate assets with the default recognizers
pub fn extract(payload: &DecodedPayload) -> Vec<ExtractedAsset> {
    Scanner::default().extract(payload)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bundle::{BundleBuilder, CompressionKind, DecodePath, decode};
    use pretty_assertions::assert_eq;

    pub(crate) fn tiny_png() -> Vec<u8> {
        let mut v = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        v.extend_from_slice(&[0, 0, 0, 13]);
        v.extend_from_slice(b"IHDR");
        v.extend_from_slice(&[0x01; 17]);
        v.extend_from_slice(&[0, 0, 0, 0]);
        v.extend_from_slice(b"IEND");
        v.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
        v
    }

    pub(crate) fn tiny_jpeg() -> Vec<u8> {
        let mut v = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        v.extend_from_slice(b"JFIF\0");
        v.extend_from_slice(&[0x02; 30]);
        v.extend_from_slice(&[0xFF, 0xD9]);
        v
    }

    #[test]
    fn test_png_then_jpeg_in_bundle() {
        let png = tiny_png();
        let jpeg = tiny_jpeg();
        let mut block = vec![0x07; 100];
        block.extend_from_slice(&png);
        block.extend_from_slice(&[0x07; 25]);
        block.extend_from_slice(&jpeg);
        block.extend_from_slice(&[0x07; 40]);

        let bytes = BundleBuilder::new()
            .add_block(&block, CompressionKind::Lz4)
            .build()
            .unwrap();
        let payload = decode(&bytes).unwrap();
        let assets = extract(&payload);

        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].format, AssetFormat::Png);
        assert_eq!(assets[0].offset, 100);
        assert_eq!(assets[0].size, png.len());
        assert_eq!(assets[0].name, "texture_0");
        assert_eq!(assets[1].format, AssetFormat::Jpeg);
        assert_eq!(assets[1].offset, 100 + png.len() + 25);
        assert_eq!(assets[1].size, jpeg.len());
        assert_eq!(assets[1].name, "texture_1");
        assert!(assets[0].end() <= assets[1].offset);
        assert!(payload.data[assets[1].offset..assets[1].end()] == jpeg[..]);
    }

    #[test]
    fn test_names_count_across_kinds() {
        let mut buf = vec![0x03; 8];
        buf.extend_from_slice(br#"{"id":"char_002_amiya","rarity":5}"#);
        buf.extend_from_slice(&tiny_png());
        buf.extend_from_slice(&[0x03; 32]);

        let assets = Scanner::default().scan(&buf);
        let names: Vec<_> = assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["text_0", "texture_1"]);
    }

    #[test]
    fn test_match_in_tail_ignored() {
        let mut buf = vec![0x03; 40];
        let at = buf.len() - SCAN_TAIL;
        buf[at..at + 3].copy_from_slice(&[0xFF, 0xD8, 0xFF]);
        buf[at + 6..at + 8].copy_from_slice(&[0xFF, 0xD9]);
        assert!(Scanner::default().scan(&buf).is_empty());
    }

    #[test]
    fn test_damaged_blocks_info_still_scanned() {
        let png = tiny_png();
        let mut block = vec![0x07; 48];
        block.extend_from_slice(&png);
        block.extend_from_slice(&[0x07; 48]);
        let mut bytes = BundleBuilder::new()
            .add_block(&block, CompressionKind::None)
            .build()
            .unwrap();
        let data_start = crate::bundle::BundleHeader::parse(&bytes)
            .unwrap()
            .data_offset()
            .unwrap();
        bytes[crate::bundle::HEADER_LEN..data_start].fill(0xFF);

        let payload = decode(&bytes).unwrap();
        assert_eq!(payload.path, DecodePath::DamagedBlocksInfo);

        let assets = extract(&payload);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].format, AssetFormat::Png);
        assert_eq!(assets[0].size, png.len());
        assert_eq!(
            &payload.data[assets[0].offset..assets[0].end()],
            png.as_slice()
        );
    }

    #[test]
    fn test_unstructured_payload_sniffed_whole() {
        let mut file = tiny_png();
        file.extend_from_slice(&tiny_jpeg());
        file.extend_from_slice(&[0x00; 32]);
        let payload = decode(&file).unwrap();
        assert_eq!(payload.path, DecodePath::Unrecognized);

        let assets = extract(&payload);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].offset, 0);
        assert_eq!(assets[0].size, file.len());
    }

    #[test]
    fn test_unidentified_payload_scanned() {
        let mut file: Vec<u8> = (0..300u32).map(|i| (i * 37 % 251) as u8).collect();
        file.extend_from_slice(&tiny_jpeg());
        file.extend_from_slice(&[0x00; 32]);
        let payload = decode(&file).unwrap();

        let assets = extract(&payload);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].format, AssetFormat::Jpeg);
        assert_eq!(assets[0].offset, 300);
    }

    #[test]
    fn test_custom_recognizer() {
        struct Marker;
        impl SignatureRecognizer for Marker {
            fn kind(&self) -> AssetKind {
                AssetKind::Text
            }
            fn format(&self) -> AssetFormat {
                AssetFormat::Text
            }
            fn matches(&self, buf: &[u8], at: usize) -> bool {
                buf.get(at..).is_some_and(|r| r.starts_with(b"MARK"))
            }
            fn extent(&self, _buf: &[u8], _at: usize) -> Option<usize> {
                Some(4)
            }
        }

        let mut scanner = Scanner::with_recognizers(Vec::new());
        scanner.register(Box::new(Marker));
        let mut buf = b"..MARK..MARK".to_vec();
        buf.resize(40, b'.');
        let offsets: Vec<_> = scanner.scan(&buf).iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![2, 8]);
    }
}
