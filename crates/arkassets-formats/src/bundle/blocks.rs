//! Blocks-info table and block-by-block payload reconstruction

use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};
use tracing::{debug, warn};

use super::MAX_DECOMPRESSION_SIZE;
use super::error::{DecodeError, DecodeResult};
use super::header::CompressionKind;

/// Bytes in front of the per-block arrays: 16-byte hash plus block count
pub const BLOCKS_INFO_PREFIX: usize = 20;

/// Bytes of metadata per block: two u32 sizes plus a u16 flags word
pub const BLOCK_ENTRY_SIZE: usize = 10;

/// Decompressed blocks-info table
///
/// Three parallel arrays follow the hash and count, in this order:
/// uncompressed sizes, compressed sizes, flags. Anything after the
/// flags array (directory entries) is not read.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct BlocksInfo {
    /// Hash of the uncompressed data (unused)
    pub hash: [u8; 16],
    /// Number of data blocks
    pub block_count: u32,
    /// Uncompressed size of each block
    #[br(count = block_count)]
    pub uncompressed_sizes: Vec<u32>,
    /// Stored size of each block
    #[br(count = block_count)]
    pub compressed_sizes: Vec<u32>,
    /// Per-block flags; the low six bits select the compression kind
    #[br(count = block_count)]
    pub flags: Vec<u16>,
}

/// Metadata for a single data block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Size after decompression
    pub uncompressed_size: u32,
    /// Size as stored
    pub compressed_size: u32,
    /// Raw flags word
    pub flags: u16,
}

impl BlockInfo {
    /// Compression applied to this block
    pub fn compression(&self) -> CompressionKind {
        CompressionKind::from_flags(u32::from(self.flags))
    }
}

impl BlocksInfo {
    /// Parse a decompressed blocks-info buffer.
    ///
    /// The declared block count is checked against the buffer length before any
    /// array is allocated.
    pub fn parse(data: &[u8]) -> DecodeResult<Self> {
        let count_bytes = data
            .get(16..BLOCKS_INFO_PREFIX)
            .ok_or(DecodeError::Truncated {
                what: "blocks info",
                needed: BLOCKS_INFO_PREFIX,
                actual: data.len(),
            })?;
        let count = u32::from_le_bytes([count_bytes[0], count_bytes[1], count_bytes[2], count_bytes[3]]);

        let needed = (count as usize)
            .checked_mul(BLOCK_ENTRY_SIZE)
            .and_then(|n| n.checked_add(BLOCKS_INFO_PREFIX))
            .ok_or(DecodeError::SizeOverflow("blocks info table"))?;
        if data.len() < needed {
            return Err(DecodeError::Truncated {
                what: "blocks info table",
                needed,
                actual: data.len(),
            });
        }

        Ok(Self::read(&mut Cursor::new(data))?)
    }

    /// Build a table from per-block metadata
    pub fn from_blocks(blocks: &[BlockInfo]) -> Self {
        Self {
            hash: [0u8; 16],
            block_count: blocks.len() as u32,
            uncompressed_sizes: blocks.iter().map(|b| b.uncompressed_size).collect(),
            compressed_sizes: blocks.iter().map(|b| b.compressed_size).collect(),
            flags: blocks.iter().map(|b| b.flags).collect(),
        }
    }

    /// Iterate blocks in storage order
    pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
        self.uncompressed_sizes
            .iter()
            .zip(&self.compressed_sizes)
            .zip(&self.flags)
            .map(|((&uncompressed_size, &compressed_size), &flags)| BlockInfo {
                uncompressed_size,
                compressed_size,
                flags,
            })
    }

    /// Sum of uncompressed block sizes, bounded by the decompression ceiling
    pub fn total_uncompressed(&self) -> DecodeResult<usize> {
        let total: u64 = self
            .uncompressed_sizes
            .iter()
            .map(|&s| u64::from(s))
            .sum();
        if total > MAX_DECOMPRESSION_SIZE as u64 {
            return Err(DecodeError::TooLarge {
                size: total,
                max: MAX_DECOMPRESSION_SIZE,
            });
        }
        Ok(total as usize)
    }

    /// Serialize the table
    pub fn to_bytes(&self) -> DecodeResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }
}

/// Decompress the blocks-info region that follows the header.
///
/// A length mismatch against the declared size is logged and tolerated.
pub fn decompress_blocks_info(compressed: &[u8], expected: usize) -> DecodeResult<Vec<u8>> {
    if expected > MAX_DECOMPRESSION_SIZE {
        return Err(DecodeError::TooLarge {
            size: expected as u64,
            max: MAX_DECOMPRESSION_SIZE,
        });
    }

    let decoded = lz4_flex::block::decompress(compressed, expected)
        .map_err(|e| DecodeError::BlocksInfo(e.to_string()))?;

    if decoded.len() != expected {
        warn!(
            "Blocks info size mismatch: expected {}, got {}",
            expected,
            decoded.len()
        );
    }
    if decoded.is_empty() {
        return Err(DecodeError::BlocksInfo(
            "decompressed to zero bytes".to_string(),
        ));
    }

    Ok(decoded)
}

/// Rebuild the uncompressed payload from the data blocks in `bytes`.
///
/// Blocks are read sequentially from `data_start`. The output buffer is allocated
/// once at the summed uncompressed size and each block is written at its running
/// offset. A block that fails to decompress is copied through as stored, truncated
/// or zero-filled to its uncompressed size; that data is corrupt but keeps the
/// offsets of later blocks intact.
pub fn reconstruct(bytes: &[u8], data_start: usize, info: &BlocksInfo) -> DecodeResult<Vec<u8>> {
    let total = info.total_uncompressed()?;
    let mut output = vec![0u8; total];

    let mut src = data_start;
    let mut dst = 0usize;

    for (index, block) in info.blocks().enumerate() {
        let out_len = block.uncompressed_size as usize;
        let end = src
            .checked_add(block.compressed_size as usize)
            .ok_or(DecodeError::SizeOverflow("block offset"))?;

        let stored = bytes
            .get(src.min(bytes.len())..end.min(bytes.len()))
            .unwrap_or_default();
        if stored.len() < block.compressed_size as usize {
            warn!(
                "Block {} truncated: expected {} bytes, have {}",
                index,
                block.compressed_size,
                stored.len()
            );
        }

        let target = &mut output[dst..dst + out_len];

        match block.compression() {
            CompressionKind::None => copy_through(stored, target),
            kind if kind.is_lz4() => match lz4_flex::block::decompress_into(stored, target) {
                Ok(written) if written == out_len => {}
                Ok(written) => {
                    warn!(
                        "Block {} decompression size mismatch: expected {}, got {}",
                        index, out_len, written
                    );
                    copy_through(stored, target);
                }
                Err(e) => {
                    warn!("Failed to decompress block {}: {}", index, e);
                    copy_through(stored, target);
                }
            },
            kind => {
                warn!(
                    "Unsupported compression in block {}: {} ({})",
                    index,
                    kind.name(),
                    kind.as_byte()
                );
                copy_through(stored, target);
            }
        }

        src = end;
        dst += out_len;
    }

    debug!("Reconstructed {} blocks, {} bytes", info.block_count, total);
    Ok(output)
}

fn copy_through(stored: &[u8], target: &mut [u8]) {
    let n = stored.len().min(target.len());
    target[..n].copy_from_slice(&stored[..n]);
    target[n..].fill(0);
}
