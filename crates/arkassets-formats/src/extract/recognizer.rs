//! Signature recognizers for embedded assets
//!
//! Each recognizer checks for its header at a position and, on a hit, estimates
//! how many bytes the asset spans. The end-of-asset rules for Ogg and MP3 are
//! heuristics: they stop at a run of zero bytes or at the next known header and
//! can over- or under-shoot on unusual streams.

use super::{AssetFormat, AssetKind};

/// PNG file signature (first four bytes)
pub const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47];
/// JPEG start-of-image marker
pub const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
/// GIF signature
pub const GIF_MAGIC: &[u8] = b"GIF8";
/// DirectDraw surface signature
pub const DDS_MAGIC: &[u8] = b"DDS ";
/// RIFF container signature
pub const RIFF_MAGIC: &[u8] = b"RIFF";
/// Ogg page capture pattern
pub const OGG_MAGIC: &[u8] = b"OggS";
/// ID3v2 tag signature
pub const ID3_MAGIC: &[u8] = b"ID3";

const PNG_END: &[u8] = b"IEND";
const JPEG_END: &[u8] = &[0xFF, 0xD9];
const ZERO_RUN: usize = 10;

/// Assets below this size are treated as false positives
const MIN_AUDIO_SIZE: usize = 1000;
const MIN_TEXT_SIZE: usize = 10;
const MAX_RIFF_SIZE: usize = 100 * 1024 * 1024;
const OGG_TAIL_WINDOW: usize = 10_000;
const OGG_TAIL_GUESS: usize = 1000;
const MP3_MIN_SPAN: usize = 1000;
const MP3_MAX_SPAN: usize = 100_000;
const JSON_MAX_SPAN: usize = 10_000;
const XML_BODY_SKIP: usize = 100;
const XML_MAX_SPAN: usize = 10_000;
const XML_CLOSE_WINDOW: usize = 1000;

/// A pluggable detector for one embedded asset format
pub trait SignatureRecognizer: Send + Sync {
    /// Asset category produced by this recognizer
    fn kind(&self) -> AssetKind;

    /// Concrete format produced by this recognizer
    fn format(&self) -> AssetFormat;

    /// Cheap header test at `at`
    fn matches(&self, buf: &[u8], at: usize) -> bool;

    /// Size of the asset starting at `at`, or `None` to reject the hit
    fn extent(&self, buf: &[u8], at: usize) -> Option<usize>;
}

/// True when `buf[at..]` starts with `magic`
pub fn has_magic(buf: &[u8], at: usize, magic: &[u8]) -> bool {
    buf.get(at..).is_some_and(|rest| rest.starts_with(magic))
}

fn find_from(buf: &[u8], from: usize, to: usize, needle: &[u8]) -> Option<usize> {
    let to = to.min(buf.len());
    if from >= to {
        return None;
    }
    buf[from..to]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn is_zero_run(buf: &[u8], at: usize) -> bool {
    buf.get(at..at + ZERO_RUN)
        .is_some_and(|w| w.iter().all(|&b| b == 0))
}

/// PNG image, ending eight bytes past the `IEND` chunk type
pub struct PngRecognizer;

impl SignatureRecognizer for PngRecognizer {
    fn kind(&self) -> AssetKind {
        AssetKind::Texture
    }

    fn format(&self) -> AssetFormat {
        AssetFormat::Png
    }

    fn matches(&self, buf: &[u8], at: usize) -> bool {
        has_magic(buf, at, PNG_MAGIC)
    }

    fn extent(&self, buf: &[u8], at: usize) -> Option<usize> {
        let end = find_from(buf, at, buf.len(), PNG_END)?;
        let size = end + 8 - at;
        (at + size <= buf.len()).then_some(size)
    }
}

/// JPEG image, ending at the end-of-image marker
pub struct JpegRecognizer;

impl SignatureRecognizer for JpegRecognizer {
    fn kind(&self) -> AssetKind {
        AssetKind::Texture
    }

    fn format(&self) -> AssetFormat {
        AssetFormat::Jpeg
    }

    fn matches(&self, buf: &[u8], at: usize) -> bool {
        has_magic(buf, at, JPEG_MAGIC)
    }

    fn extent(&self, buf: &[u8], at: usize) -> Option<usize> {
        let end = find_from(buf, at, buf.len(), JPEG_END)?;
        Some(end + JPEG_END.len() - at)
    }
}

/// RIFF/WAV audio, sized by the RIFF length field
pub struct RiffRecognizer;

impl SignatureRecognizer for RiffRecognizer {
    fn kind(&self) -> AssetKind {
        AssetKind::Audio
    }

    fn format(&self) -> AssetFormat {
        AssetFormat::Wav
    }

    fn matches(&self, buf: &[u8], at: usize) -> bool {
        has_magic(buf, at, RIFF_MAGIC)
    }

    fn extent(&self, buf: &[u8], at: usize) -> Option<usize> {
        let field = buf.get(at + 4..at + 8)?;
        let size = u32::from_le_bytes([field[0], field[1], field[2], field[3]]) as usize + 8;
        (size > MIN_AUDIO_SIZE && size < MAX_RIFF_SIZE && at + size <= buf.len()).then_some(size)
    }
}

/// Ogg audio, ending at the first zero run after the last `OggS` page
pub struct OggRecognizer;

impl SignatureRecognizer for OggRecognizer {
    fn kind(&self) -> AssetKind {
        AssetKind::Audio
    }

    fn format(&self) -> AssetFormat {
        AssetFormat::Ogg
    }

    fn matches(&self, buf: &[u8], at: usize) -> bool {
        has_magic(buf, at, OGG_MAGIC)
    }

    fn extent(&self, buf: &[u8], at: usize) -> Option<usize> {
        let last_page = buf
            .get(at + 4..)
            .and_then(|rest| rest.windows(OGG_MAGIC.len()).rposition(|w| w == OGG_MAGIC))
            .map_or(at, |p| p + at + 4);

        // keep 50 bytes of lookahead like a fixed-size probe window
        let window_end = (last_page + OGG_TAIL_WINDOW).min(buf.len().saturating_sub(50));
        let size = (last_page..window_end)
            .find(|&j| is_zero_run(buf, j))
            .map(|j| j - at)
            .or_else(|| {
                (last_page > at)
                    .then(|| (last_page - at + OGG_TAIL_GUESS).min(buf.len() - at))
            })?;

        (size > MIN_AUDIO_SIZE).then_some(size)
    }
}

/// MP3 audio (ID3 tag or bare frame sync), ending at a zero run or the next header
pub struct Mp3Recognizer;

impl Mp3Recognizer {
    fn is_boundary(buf: &[u8], j: usize) -> bool {
        is_zero_run(buf, j)
            || [PNG_MAGIC, JPEG_MAGIC, RIFF_MAGIC, OGG_MAGIC, ID3_MAGIC]
                .iter()
                .any(|magic| has_magic(buf, j, magic))
    }
}

impl SignatureRecognizer for Mp3Recognizer {
    fn kind(&self) -> AssetKind {
        AssetKind::Audio
    }

    fn format(&self) -> AssetFormat {
        AssetFormat::Mp3
    }

    fn matches(&self, buf: &[u8], at: usize) -> bool {
        has_magic(buf, at, ID3_MAGIC)
            || has_magic(buf, at, &[0xFF, 0xFB])
            || has_magic(buf, at, &[0xFF, 0xFA])
    }

    fn extent(&self, buf: &[u8], at: usize) -> Option<usize> {
        let end = (at + MP3_MAX_SPAN).min(buf.len().saturating_sub(ZERO_RUN));
        let size = (at + MP3_MIN_SPAN..end)
            .find(|&j| Self::is_boundary(buf, j))
            .map(|j| j - at)?;
        (size > MIN_AUDIO_SIZE).then_some(size)
    }
}

/// JSON object text, ending where braces balance
pub struct JsonRecognizer;

impl SignatureRecognizer for JsonRecognizer {
    fn kind(&self) -> AssetKind {
        AssetKind::Text
    }

    fn format(&self) -> AssetFormat {
        AssetFormat::Json
    }

    fn matches(&self, buf: &[u8], at: usize) -> bool {
        has_magic(buf, at, b"{\"")
    }

    fn extent(&self, buf: &[u8], at: usize) -> Option<usize> {
        let limit = (at + JSON_MAX_SPAN).min(buf.len());
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (j, &c) in buf.iter().enumerate().take(limit).skip(at) {
            if in_string {
                match c {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match c {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        let size = j + 1 - at;
                        return (size > MIN_TEXT_SIZE).then_some(size);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// XML document, ending at the first closing tag after the prolog region
pub struct XmlRecognizer;

impl SignatureRecognizer for XmlRecognizer {
    fn kind(&self) -> AssetKind {
        AssetKind::Text
    }

    fn format(&self) -> AssetFormat {
        AssetFormat::Xml
    }

    fn matches(&self, buf: &[u8], at: usize) -> bool {
        has_magic(buf, at, b"<?xml")
    }

    fn extent(&self, buf: &[u8], at: usize) -> Option<usize> {
        let close = find_from(buf, at + XML_BODY_SKIP, at + XML_MAX_SPAN, b"</")?;
        let gt = find_from(buf, close, close + XML_CLOSE_WINDOW, b">")?;
        let size = gt + 1 - at;
        (size > MIN_TEXT_SIZE).then_some(size)
    }
}

/// Recognizers registered by default, in priority order
pub fn default_recognizers() -> Vec<Box<dyn SignatureRecognizer>> {
    vec![
        Box::new(PngRecognizer),
        Box::new(JpegRecognizer),
        Box::new(RiffRecognizer),
        Box::new(OggRecognizer),
        Box::new(Mp3Recognizer),
        Box::new(JsonRecognizer),
        Box::new(XmlRecognizer),
    ]
}
