//! UnityFS bundle builder

use binrw::BinWrite;
use binrw::io::Cursor;

use super::blocks::{BlockInfo, BlocksInfo};
use super::error::DecodeResult;
use super::header::{BundleHeader, CompressionKind, HEADER_LEN, UNITYFS_SIGNATURE, padded_field};

/// Builder for UnityFS bundles.
///
/// Produces the header, an LZ4-compressed blocks-info region and the data blocks.
/// Used to create fixtures and to exercise the decoder end to end.
pub struct BundleBuilder {
    format_version: u32,
    engine_version: String,
    engine_revision: String,
    info_compression: CompressionKind,
    blocks: Vec<(BlockInfo, Vec<u8>)>,
}

impl Default for BundleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BundleBuilder {
    /// Create a builder with LZ4 blocks-info compression
    pub fn new() -> Self {
        Self {
            format_version: 6,
            engine_version: "5.x.x".to_string(),
            engine_revision: "2017.4.39f1".to_string(),
            info_compression: CompressionKind::Lz4,
            blocks: Vec::new(),
        }
    }

    /// Set the engine version and revision strings
    #[must_use]
    pub fn with_engine(mut self, version: &str, revision: &str) -> Self {
        self.engine_version = version.to_string();
        self.engine_revision = revision.to_string();
        self
    }

    /// Set the compression recorded in the header flags.
    ///
    /// Only LZ4 and LZ4HC compress the blocks-info region; any other kind stores it
    /// as-is.
    #[must_use]
    pub fn with_info_compression(mut self, kind: CompressionKind) -> Self {
        self.info_compression = kind;
        self
    }

    /// Append a data block, compressing it with `kind` when that is LZ4 or LZ4HC
    #[must_use]
    pub fn add_block(mut self, data: &[u8], kind: CompressionKind) -> Self {
        let stored = if kind.is_lz4() {
            lz4_flex::block::compress(data)
        } else {
            data.to_vec()
        };
        let info = BlockInfo {
            uncompressed_size: data.len() as u32,
            compressed_size: stored.len() as u32,
            flags: u16::from(kind.as_byte()) | 0x40,
        };
        self.blocks.push((info, stored));
        self
    }

    /// Append a block exactly as given, with caller-supplied metadata
    #[must_use]
    pub fn add_raw_block(mut self, stored: Vec<u8>, uncompressed_size: u32, flags: u16) -> Self {
        let info = BlockInfo {
            uncompressed_size,
            compressed_size: stored.len() as u32,
            flags,
        };
        self.blocks.push((info, stored));
        self
    }

    /// Serialize the bundle
    pub fn build(self) -> DecodeResult<Vec<u8>> {
        let infos: Vec<BlockInfo> = self.blocks.iter().map(|(info, _)| *info).collect();
        let table = BlocksInfo::from_blocks(&infos).to_bytes()?;
        let stored_table = if self.info_compression.is_lz4() {
            lz4_flex::block::compress(&table)
        } else {
            table.clone()
        };

        let data_len: usize = self.blocks.iter().map(|(_, stored)| stored.len()).sum();
        let total_size = (HEADER_LEN + stored_table.len() + data_len) as u64;

        let header = BundleHeader {
            signature: UNITYFS_SIGNATURE,
            format_version: self.format_version,
            engine_version: padded_field(&self.engine_version),
            engine_revision: padded_field(&self.engine_revision),
            total_size,
            compressed_blocks_info_size: stored_table.len() as u32,
            uncompressed_blocks_info_size: table.len() as u32,
            flags: u32::from(self.info_compression.as_byte()) | 0x40,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(total_size as usize));
        header.write(&mut cursor)?;
        let mut out = cursor.into_inner();
        out.extend_from_slice(&stored_table);
        for (_, stored) in &self.blocks {
            out.extend_from_slice(stored);
        }
        Ok(out)
    }
}
