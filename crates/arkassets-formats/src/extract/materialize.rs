//! Writing extracted assets to disk

use std::fs;
use std::path::{Path, PathBuf};

use arkassets_crypto::{TextKind, classify, decode_text_asset, looks_encrypted};
use tracing::{debug, info, warn};

use super::error::{ExtractResult, ExtractionError};
use super::{AssetFormat, AssetKind, ExtractedAsset, Scanner};
use crate::bundle::DecodedPayload;

/// Outcome of unpacking one payload
#[derive(Debug, Default)]
pub struct UnpackReport {
    /// Files written, in extraction order
    pub written: Vec<PathBuf>,
    /// Assets located but not written
    pub failed: usize,
}

/// Directory an asset file is unpacked into: `<dir>/<stem>_unpacked`
pub fn unpack_dir(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = source.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{stem}_unpacked"))
}

fn is_json(bytes: &[u8]) -> Option<serde_json::Value> {
    serde_json::from_slice(bytes).ok()
}

fn raw_text(bytes: &[u8]) -> ExtractResult<(Vec<u8>, &'static str)> {
    if let Some(value) = is_json(bytes) {
        return Ok((serde_json::to_vec_pretty(&value)?, "json"));
    }

    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim_start();
    let ext = if trimmed.starts_with('<') && trimmed.contains("</") {
        "xml"
    } else if bytes.contains(&0) {
        "bin"
    } else {
        "txt"
    };
    Ok((bytes.to_vec(), ext))
}

/// Turn text-asset bytes into the bytes and extension to write.
///
/// Buffers that look encrypted are decoded per `kind`; decrypted JSON is
/// pretty-printed and anything else is kept as `.bin`. When decryption fails the
/// raw bytes are classified as JSON, XML, binary or plain text instead.
pub fn render_text(bytes: &[u8], kind: TextKind) -> ExtractResult<(Vec<u8>, &'static str)> {
    if !looks_encrypted(bytes) {
        return raw_text(bytes);
    }

    match decode_text_asset(bytes, kind) {
        Ok(plain) => match is_json(&plain) {
            Some(value) => Ok((serde_json::to_vec_pretty(&value)?, "json")),
            None => Ok((plain, "bin")),
        },
        Err(e) => {
            warn!("Decryption failed, falling back to raw data: {}", e);
            raw_text(bytes)
        }
    }
}

/// Write one asset from `data` into `output_dir`, returning the file path
pub fn materialize(
    asset: &ExtractedAsset,
    data: &[u8],
    output_dir: &Path,
    text_kind: TextKind,
) -> ExtractResult<PathBuf> {
    let bytes = data
        .get(asset.offset..asset.end())
        .ok_or_else(|| ExtractionError::OutOfBounds {
            name: asset.name.clone(),
            offset: asset.offset,
            size: asset.size,
            len: data.len(),
        })?;

    let (contents, ext) = match asset.kind {
        AssetKind::Text => render_text(bytes, text_kind)?,
        AssetKind::Texture | AssetKind::Audio => (bytes.to_vec(), asset.format.extension()),
    };

    let path = output_dir.join(format!("{}.{}", asset.name, ext));
    fs::write(&path, &contents).map_err(|e| ExtractionError::io(&path, e))?;
    debug!("Extracted {} ({} bytes)", path.display(), contents.len());
    Ok(path)
}

/// Whole payload as one encrypted text asset, if it decodes to JSON
fn encrypted_whole(payload: &DecodedPayload, kind: TextKind) -> Option<ExtractedAsset> {
    if !looks_encrypted(&payload.data) {
        return None;
    }
    let plain = decode_text_asset(&payload.data, kind).ok()?;
    is_json(&plain)?;
    Some(ExtractedAsset::new(AssetFormat::Json, 0, payload.len(), 0))
}

/// Extract every asset in `payload` next to `source`.
///
/// `relative_path` is the manifest path of the source file and selects how text
/// assets are decoded. Assets that fail to write are logged and counted; the
/// unpack directory is removed again when nothing was written.
pub fn unpack(
    scanner: &Scanner,
    payload: &DecodedPayload,
    source: &Path,
    relative_path: &str,
) -> ExtractResult<UnpackReport> {
    let text_kind = classify(relative_path);
    let mut assets = scanner.extract(payload);
    if assets.is_empty() {
        assets.extend(encrypted_whole(payload, text_kind));
    }

    let mut report = UnpackReport::default();
    if assets.is_empty() {
        debug!("No assets found in {}", relative_path);
        return Ok(report);
    }

    let dir = unpack_dir(source);
    fs::create_dir_all(&dir).map_err(|e| ExtractionError::io(&dir, e))?;

    for asset in &assets {
        match materialize(asset, &payload.data, &dir, text_kind) {
            Ok(path) => report.written.push(path),
            Err(e) => {
                warn!("Failed to extract {} from {}: {}", asset.name, relative_path, e);
                report.failed += 1;
            }
        }
    }

    if report.written.is_empty() {
        if let Err(e) = fs::remove_dir(&dir) {
            debug!("Keeping {}: {}", dir.display(), e);
        }
    } else {
        info!(
            "Extracted {} assets from {}",
            report.written.len(),
            relative_path
        );
    }
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bundle::{BundleBuilder, CompressionKind, DecodePath, decode};
    use arkassets_crypto::{RSA_HEADER_LEN, encrypt_text_asset};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SEED: [u8; 16] = *b"0123456789abcdef";

    fn payload_of(data: Vec<u8>) -> DecodedPayload {
        DecodedPayload {
            header: None,
            path: DecodePath::Unrecognized,
            data,
        }
    }

    #[test]
    fn test_unpack_dir_naming() {
        assert_eq!(
            unpack_dir(Path::new("/save/arts/charportraits/pack1.ab")),
            PathBuf::from("/save/arts/charportraits/pack1_unpacked")
        );
    }

    #[test]
    fn test_render_encrypted_json() {
        let stream = encrypt_text_asset(br#"{"a":1,"b":[true]}"#, SEED).unwrap();
        let (bytes, ext) = render_text(&stream, TextKind::StandardText).unwrap();
        assert_eq!(ext, "json");
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "{\n  \"a\": 1,\n  \"b\": [\n    true\n  ]\n}"
        );
    }

    #[test]
    fn test_render_encrypted_non_json() {
        let stream = encrypt_text_asset(b"not a table", SEED).unwrap();
        let (bytes, ext) = render_text(&stream, TextKind::StandardText).unwrap();
        assert_eq!(ext, "bin");
        assert_eq!(bytes, b"not a table");
    }

    #[test]
    fn test_render_level_data_skips_header() {
        let mut stream = vec![0xA5; RSA_HEADER_LEN];
        stream.extend_from_slice(br#"{"options":{"characterLimit":8}}"#);
        let (bytes, ext) = render_text(&stream, TextKind::LevelData).unwrap();
        assert_eq!(ext, "json");
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["options"]["characterLimit"], 8);
    }

    #[test]
    fn test_render_decryption_failure_falls_back() {
        // 128 + 20 bytes: not block aligned after the IV
        let mut stream = vec![b'x'; RSA_HEADER_LEN + 20];
        stream.push(b'\n');
        let (bytes, ext) = render_text(&stream, TextKind::StandardText).unwrap();
        assert_eq!(ext, "txt");
        assert_eq!(bytes, stream);

        stream[3] = 0;
        let (_, ext) = render_text(&stream, TextKind::StandardText).unwrap();
        assert_eq!(ext, "bin");
    }

    #[test]
    fn test_render_bad_padding_keeps_raw_bytes() {
        let mut stream = encrypt_text_asset(b"hello", SEED).unwrap();
        // the IV seed feeds the first block, so this turns the 0x0b pad byte into 0x00
        stream[RSA_HEADER_LEN + 15] ^= 0x0b;
        let (bytes, ext) = render_text(&stream, TextKind::StandardText).unwrap();
        assert_eq!(bytes, stream);
        assert_eq!(ext, "bin");
    }

    #[test]
    fn test_render_plain_text() {
        let (_, ext) = render_text(b"<root><a>1</a></root>", TextKind::StandardText).unwrap();
        assert_eq!(ext, "xml");
        let (bytes, ext) = render_text(br#"{"k":"v"}"#, TextKind::StandardText).unwrap();
        assert_eq!(ext, "json");
        assert_eq!(bytes, b"{\n  \"k\": \"v\"\n}");
    }

    #[test]
    fn test_out_of_bounds_asset() {
        let dir = TempDir::new().unwrap();
        let asset = ExtractedAsset::new(AssetFormat::Png, 10, 50, 0);
        let err = materialize(&asset, &[0u8; 20], dir.path(), TextKind::StandardText).unwrap_err();
        assert!(matches!(err, ExtractionError::OutOfBounds { len: 20, .. }));
    }

    #[test]
    fn test_unpack_bundle_writes_assets() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("charpack.ab");
        let png = crate::extract::tests::tiny_png();
        let mut block = vec![0x07; 64];
        block.extend_from_slice(&png);
        block.extend_from_slice(br#"{"skinId":"char_002_amiya#2","displayName":"x"}"#);
        block.extend_from_slice(&[0x07; 32]);
        let bytes = BundleBuilder::new()
            .add_block(&block, CompressionKind::Lz4)
            .build()
            .unwrap();
        let payload = decode(&bytes).unwrap();

        let report = unpack(&Scanner::default(), &payload, &source, "charpack.ab").unwrap();
        assert_eq!(report.failed, 0);
        let names: Vec<_> = report
            .written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["texture_0.png", "text_1.json"]);
        assert_eq!(fs::read(&report.written[0]).unwrap(), png);
        assert!(report.written[0].starts_with(dir.path().join("charpack_unpacked")));
    }

    #[test]
    fn test_unpack_encrypted_whole_file() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("character_table.ab");
        let table = br#"{"char_002_amiya":{"name":"Amiya","rarity":4}}"#;
        let stream = encrypt_text_asset(table, SEED).unwrap();

        let report = unpack(
            &Scanner::default(),
            &payload_of(stream),
            &source,
            "gamedata/excel/character_table.ab",
        )
        .unwrap();
        assert_eq!(report.written.len(), 1);
        let written = fs::read(&report.written[0]).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(value["char_002_amiya"]["name"], "Amiya");
        assert!(report.written[0].ends_with("text_0.json"));
    }

    #[test]
    fn test_unpack_nothing_found_leaves_no_dir() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("noise.ab");
        let noise: Vec<u8> = (0..2000u32).map(|i| (i * 37 % 251) as u8).collect();

        let report = unpack(&Scanner::default(), &payload_of(noise), &source, "noise.ab").unwrap();
        assert!(report.written.is_empty());
        assert!(!unpack_dir(&source).exists());
    }
}
