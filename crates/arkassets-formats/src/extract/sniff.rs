//! Whole-buffer type sniffing
//!
//! Used when a payload is not a structured bundle (it may be a bare image or
//! audio file), and as a last resort when a structured scan finds nothing.

use super::recognizer::{
    DDS_MAGIC, GIF_MAGIC, ID3_MAGIC, JPEG_MAGIC, OGG_MAGIC, PNG_MAGIC, RIFF_MAGIC, has_magic,
};
use super::AssetFormat;

const TEXT_SAMPLE: usize = 1000;
const PRINTABLE_RATIO: f64 = 0.8;

/// Identify the whole buffer as a single asset format
pub fn sniff_whole(buf: &[u8]) -> Option<AssetFormat> {
    if buf.is_empty() {
        return None;
    }

    let image = [
        (PNG_MAGIC, AssetFormat::Png),
        (JPEG_MAGIC, AssetFormat::Jpeg),
        (GIF_MAGIC, AssetFormat::Gif),
        (DDS_MAGIC, AssetFormat::Dds),
    ];
    let audio: [(&[u8], AssetFormat); 5] = [
        (RIFF_MAGIC, AssetFormat::Wav),
        (OGG_MAGIC, AssetFormat::Ogg),
        (ID3_MAGIC, AssetFormat::Mp3),
        (&[0xFF, 0xFB], AssetFormat::Mp3),
        (&[0xFF, 0xFA], AssetFormat::Mp3),
    ];

    image
        .into_iter()
        .chain(audio)
        .find(|(magic, _)| has_magic(buf, 0, magic))
        .map(|(_, format)| format)
        .or_else(|| sniff_text(buf))
}

fn sniff_text(buf: &[u8]) -> Option<AssetFormat> {
    let sample = &buf[..buf.len().min(TEXT_SAMPLE)];
    let text = String::from_utf8_lossy(sample);
    let trimmed = text.trim();

    if trimmed.starts_with('{') && serde_json::from_slice::<serde_json::Value>(buf).is_ok() {
        return Some(AssetFormat::Json);
    }
    if trimmed.starts_with('<') && trimmed.contains('>') {
        return Some(AssetFormat::Xml);
    }

    let printable = sample
        .iter()
        .filter(|&&b| (0x20..0x7F).contains(&b) || matches!(b, b'\n' | b'\r' | b'\t'))
        .count();
    (printable as f64 / sample.len() as f64 >= PRINTABLE_RATIO).then_some(AssetFormat::Text)
}
